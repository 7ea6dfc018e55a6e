//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, request span)
//!     → handlers.rs (sync gateway, firewall events)
//!       or admin::handlers (mutations, health checks)
//!     → response.rs (EdgeError → status + JSON body)
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{ApiError, ApiResult, ErrorBody};
pub use server::{AppState, HttpServer};
