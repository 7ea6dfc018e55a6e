//! Error responses.
//!
//! # Responsibilities
//! - Map core errors to HTTP status codes
//! - Render a uniform JSON error body
//!
//! # Design Decisions
//! - Absent configs are a 404 at this layer only; the core returns `None`
//! - Decode failures are server errors: the stored data is bad, not the request

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::EdgeError;
use crate::model::EntityKind;
use crate::store::StoreError;

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub error: String,
}

/// Error type returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "validation",
            message: message.into(),
        }
    }

    pub fn not_found(kind: EntityKind, id: i64) -> Self {
        EdgeError::NotFound { kind, id }.into()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<EdgeError> for ApiError {
    fn from(err: EdgeError) -> Self {
        let (status, code) = match &err {
            EdgeError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation"),
            EdgeError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            EdgeError::Decode { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "decode"),
            EdgeError::Store(StoreError::Unavailable(_)) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
            EdgeError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store"),
        };

        if status.is_server_error() {
            tracing::error!(error = %err, code, "Request failed");
        }

        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.to_string(),
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
