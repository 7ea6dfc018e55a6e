//! Edge control plane server.
//!
//! Usage: `edge-control [CONFIG_PATH]`. Without a path the built-in defaults
//! are used and no config watcher runs.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::net::TcpListener;

use edge_control::config::watcher::ConfigWatcher;
use edge_control::config::{load_config, ControlConfig};
use edge_control::lifecycle::{bootstrap, signals, Shutdown};
use edge_control::observability::{logging, metrics};
use edge_control::HttpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => ControlConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-control starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        admin_enabled = config.admin.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let components = bootstrap(&config).await?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let admin_listener = if config.admin.enabled {
        Some(TcpListener::bind(&config.admin.bind_address).await?)
    } else {
        None
    };

    let shared = Arc::new(ArcSwap::from_pointee(config));
    let shutdown = Shutdown::new();

    // Hot reload; the watcher handle must outlive the server.
    let _watcher = match &config_path {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            let shared = shared.clone();
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(new_config) = updates.recv() => {
                            shared.store(Arc::new(new_config));
                            tracing::info!("Configuration reloaded");
                        }
                        _ = stop.recv() => break,
                    }
                }
            });
            Some(handle)
        }
        None => None,
    };

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            signals::wait_for_signal().await;
            shutdown.trigger();
        });
    }

    let server = HttpServer::new(shared, components);
    server.run(listener, admin_listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
