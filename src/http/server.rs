//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the node-facing and admin Axum routers
//! - Wire up middleware (timeout, tracing, request ID)
//! - Serve each router on its own listener until shutdown

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::schema::ControlConfig;
use crate::http::handlers;
use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::{shutdown, Components, Shutdown};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Current configuration; swapped in place on reload.
    pub config: Arc<ArcSwap<ControlConfig>>,
    pub components: Components,
}

/// HTTP front of the control plane.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    pub fn new(config: Arc<ArcSwap<ControlConfig>>, components: Components) -> Self {
        Self {
            state: AppState { config, components },
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Router for polling edge nodes.
    pub fn sync_router(&self) -> Router {
        let router = Router::new()
            .route("/healthz", get(handlers::healthz))
            .route("/api/v1/sync/pending", get(handlers::list_pending))
            .route("/api/v1/sync/config/{kind}/{id}", get(handlers::fetch_config))
            .route("/api/v1/sync/nodes/{id}/config", get(handlers::fetch_node_config))
            .route("/api/v1/sync/nodes/{id}/ack", post(handlers::ack_node))
            .route("/api/v1/firewall/events", post(handlers::firewall_event))
            .with_state(self.state.clone());
        self.with_layers(router)
    }

    /// Router for operators, behind the bearer key.
    pub fn admin_router(&self) -> Router {
        self.with_layers(crate::admin::setup_admin_router(self.state.clone()))
    }

    #[allow(deprecated)]
    fn with_layers(&self, router: Router) -> Router {
        let request_secs = self.state.config.load().timeouts.request_secs;
        router
            .layer(TimeoutLayer::new(Duration::from_secs(request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(set_request_id_layer())
    }

    /// Serve the sync router on `listener`, and the admin router on
    /// `admin_listener` when given, until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        admin_listener: Option<TcpListener>,
        shutdown: &Shutdown,
    ) -> Result<(), std::io::Error> {
        let admin = match admin_listener {
            Some(admin_listener) => {
                let router = self.admin_router();
                let rx = shutdown.subscribe();
                Some(tokio::spawn(serve(admin_listener, router, rx)))
            }
            None => None,
        };

        serve(listener, self.sync_router(), shutdown.subscribe()).await?;

        if let Some(handle) = admin {
            match handle.await {
                Ok(result) => result?,
                Err(e) => tracing::error!(error = %e, "Admin server task failed"),
            }
        }
        Ok(())
    }
}

/// Serve one router until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown::wait(shutdown))
        .await?;

    tracing::info!(address = %addr, "HTTP server stopped");
    Ok(())
}
