//! Admin API.
//!
//! # Data Flow
//! ```text
//! operator request (Bearer key)
//!     → auth.rs (key from the current config)
//!     → handlers.rs
//!     → mutations.rs (store write → propagation)
//!       or health / messaging read paths
//! ```

pub mod auth;
pub mod handlers;
pub mod mutations;

use axum::routing::{get, post, put};
use axum::{middleware, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub use mutations::{MutationOutcome, MutationService};

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/messages", get(list_messages))
        .route("/admin/clusters", put(save_cluster))
        .route("/admin/nodes", put(save_node))
        .route("/admin/servers", put(save_server))
        .route("/admin/groups", put(save_group))
        .route("/admin/reverse-proxies", put(save_reverse_proxy))
        .route("/admin/origins", put(save_origin))
        .route("/admin/groups/orders", post(update_group_orders))
        .route("/admin/groups/{id}/reverse-proxy/{protocol}", post(update_group_reverse_proxy))
        .route("/admin/clusters/{id}/health-check/execute", post(execute_health_check))
        .route("/admin/entities/{kind}/{id}/disable", post(disable))
        .route("/admin/entities/{kind}/{id}/enable", post(enable))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
