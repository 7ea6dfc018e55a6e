//! Error kinds surfaced by composition, propagation and mutations.
//!
//! A missing or disabled entity is not an error: it composes to `None`.

use thiserror::Error;

use crate::model::EntityKind;
use crate::store::StoreError;

/// Errors returned by the core operations.
#[derive(Debug, Error)]
pub enum EdgeError {
    /// A required argument was malformed or zero.
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// A stored reference could not be parsed.
    #[error("Failed to decode {field} of {kind} {id}: {source}")]
    Decode {
        kind: EntityKind,
        id: i64,
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The backing store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A mutation targeted an entity that does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },
}

impl EdgeError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        EdgeError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for core operations.
pub type EdgeResult<T> = Result<T, EdgeError>;

/// Reject ids that cannot name a stored entity.
pub fn require_id(field: &'static str, id: i64) -> EdgeResult<()> {
    if id <= 0 {
        return Err(EdgeError::validation(field, format!("expected a positive id, got {}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_id() {
        assert!(require_id("origin_id", 3).is_ok());
        let err = require_id("origin_id", 0).unwrap_err();
        assert_eq!(err.to_string(), "Invalid origin_id: expected a positive id, got 0");
    }

    #[test]
    fn test_decode_error_display() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = EdgeError::Decode {
            kind: EntityKind::ServerGroup,
            id: 4,
            field: "http_reverse_proxy",
            source,
        };
        assert!(err.to_string().starts_with("Failed to decode http_reverse_proxy of server_group 4"));
    }
}
