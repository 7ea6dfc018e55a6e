//! Value types shared between stored entities and composed configs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unit of a [`TimeDuration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Ms,
    #[default]
    Second,
    Minute,
    Hour,
}

/// A count of time units, as edited in the admin UI and shipped to nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeDuration {
    pub count: u64,
    #[serde(default)]
    pub unit: TimeUnit,
}

impl TimeDuration {
    pub fn seconds(count: u64) -> Self {
        Self {
            count,
            unit: TimeUnit::Second,
        }
    }

    pub fn to_duration(&self) -> Duration {
        match self.unit {
            TimeUnit::Ms => Duration::from_millis(self.count),
            TimeUnit::Second => Duration::from_secs(self.count),
            TimeUnit::Minute => Duration::from_secs(self.count.saturating_mul(60)),
            TimeUnit::Hour => Duration::from_secs(self.count.saturating_mul(3600)),
        }
    }
}

/// Network address of an origin.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAddress {
    /// `http`, `https`, `tcp`, `tls` or `udp`.
    pub protocol: String,
    pub host: String,
    /// Single port (`"8080"`) or inclusive range (`"8000-8010"`).
    pub port_range: String,
}

/// Load-balancing policy of a reverse proxy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingConfig {
    /// Algorithm code, e.g. `random`, `roundRobin`, `weight`, `hash`.
    pub code: String,
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// Health-check policy stored on a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthCheckPolicy {
    pub is_on: bool,
    /// Port probed on every node; 0 falls back to the configured default.
    pub port: u16,
    /// Path probed on every node; empty falls back to the configured default.
    pub url_path: String,
    pub timeout: Option<TimeDuration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_duration_units() {
        assert_eq!(TimeDuration::seconds(5).to_duration(), Duration::from_secs(5));
        let ms = TimeDuration {
            count: 250,
            unit: TimeUnit::Ms,
        };
        assert_eq!(ms.to_duration(), Duration::from_millis(250));
        let minutes: TimeDuration = serde_json::from_str(r#"{"count": 2, "unit": "minute"}"#).unwrap();
        assert_eq!(minutes.to_duration(), Duration::from_secs(120));
    }

    #[test]
    fn test_health_check_policy_defaults() {
        let policy: HealthCheckPolicy = serde_json::from_str(r#"{"isOn": true}"#).unwrap();
        assert!(policy.is_on);
        assert_eq!(policy.port, 0);
        assert!(policy.url_path.is_empty());
        assert!(policy.timeout.is_none());
    }
}
