//! Serialized references between entities.
//!
//! References are stored as JSON text inside the owning record. The text is
//! kept verbatim so that a malformed blob survives until composition, where it
//! is reported as a decode error instead of being silently dropped on write.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::kind::{EntityKind, EntityRef};

/// Raw JSON text of a stored reference. Empty text or `null` means "no reference".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RawRef(String);

impl RawRef {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Encode a reference value into its stored form.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_string(value).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the reference is absent, empty or the literal `null`.
    pub fn is_empty(&self) -> bool {
        let text = self.0.trim();
        text.is_empty() || text == "null"
    }

    /// Decode the stored text. Absent references decode to `None`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        if self.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&self.0).map(Some)
    }
}

// Seed files may carry a reference either as JSON text or as an inline JSON
// value; both end up stored as text.
impl<'de> Deserialize<'de> for RawRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::String(text) => RawRef(text),
            serde_json::Value::Null => RawRef::default(),
            other => RawRef(other.to_string()),
        })
    }
}

/// Transport protocol a reverse-proxy reference applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Tcp,
    Udp,
}

impl ProxyProtocol {
    pub const ALL: [ProxyProtocol; 3] = [ProxyProtocol::Http, ProxyProtocol::Tcp, ProxyProtocol::Udp];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Tcp => "tcp",
            ProxyProtocol::Udp => "udp",
        }
    }

    /// Name of the stored field holding the reference for this protocol.
    pub fn field_name(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http_reverse_proxy",
            ProxyProtocol::Tcp => "tcp_reverse_proxy",
            ProxyProtocol::Udp => "udp_reverse_proxy",
        }
    }
}

impl std::str::FromStr for ProxyProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ProxyProtocol::Http),
            "tcp" => Ok(ProxyProtocol::Tcp),
            "udp" => Ok(ProxyProtocol::Udp),
            other => Err(format!("unknown proxy protocol '{}'", other)),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Reference from a server or group to a reverse-proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseProxyRef {
    pub reverse_proxy_id: i64,
    #[serde(default = "default_true")]
    pub is_on: bool,
    /// When set on a group, the group's proxy wins over the server's own.
    #[serde(default)]
    pub is_prior: bool,
}

impl ReverseProxyRef {
    pub fn new(reverse_proxy_id: i64) -> Self {
        Self {
            reverse_proxy_id,
            is_on: true,
            is_prior: false,
        }
    }

    pub fn target(&self) -> EntityRef {
        EntityRef::new(EntityKind::ReverseProxy, self.reverse_proxy_id)
    }
}

/// Reference from a reverse proxy to one origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginRef {
    pub origin_id: i64,
    #[serde(default = "default_true")]
    pub is_on: bool,
}

impl OriginRef {
    pub fn new(origin_id: i64) -> Self {
        Self { origin_id, is_on: true }
    }

    pub fn target(&self) -> EntityRef {
        EntityRef::new(EntityKind::Origin, self.origin_id)
    }
}
