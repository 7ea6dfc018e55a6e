//! Reading `ControlConfig` from TOML.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ControlConfig;
use crate::config::validation::{validate_config, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Read, parse and validate the file at `path`.
pub fn load_config(path: &Path) -> Result<ControlConfig, ConfigError> {
    parse_config(&fs::read_to_string(path)?)
}

pub fn parse_config(content: &str) -> Result<ControlConfig, ConfigError> {
    let config: ControlConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config = parse_config("[admin]\napi_key = \"k\"\n").unwrap();
        assert_eq!(config.admin.api_key, "k");
        assert_eq!(config.health_check.port, 80);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = parse_config("[listener\nbind_address = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_lists_fields() {
        let err = parse_config("[timeouts]\nrequest_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("timeouts.request_secs"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/edge-control.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
