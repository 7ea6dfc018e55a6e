//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the entity store and load its seed
//! - Initialize the core services in dependency order
//!
//! # Design Decisions
//! - Fail fast: a bad seed file is fatal
//! - Every service receives the same injected store handle

use std::sync::Arc;

use crate::admin::mutations::MutationService;
use crate::compose::Composer;
use crate::config::schema::ControlConfig;
use crate::error::EdgeResult;
use crate::health::HealthCheckExecutor;
use crate::messaging::{FirewallNotifier, MemoryMessageSink, MessageSink};
use crate::propagation::ChangeTracker;
use crate::store::{EntityStore, MemoryStore, Seed};
use crate::sync::SyncGateway;

/// The wired core services shared by the HTTP layers.
#[derive(Clone)]
pub struct Components {
    pub store: Arc<dyn EntityStore>,
    pub composer: Composer,
    pub tracker: ChangeTracker,
    pub gateway: SyncGateway,
    pub mutations: MutationService,
    pub messages: Arc<dyn MessageSink>,
    pub firewall: FirewallNotifier,
    pub health: HealthCheckExecutor,
}

impl Components {
    /// Wire every service around an existing store and message sink.
    pub fn new(store: Arc<dyn EntityStore>, messages: Arc<dyn MessageSink>, config: &ControlConfig) -> Self {
        let composer = Composer::new(store.clone());
        let tracker = ChangeTracker::new(store.clone());
        let gateway = SyncGateway::new(store.clone(), composer.clone());
        let mutations = MutationService::new(store.clone(), tracker.clone());
        let firewall = FirewallNotifier::new(store.clone(), messages.clone());
        let health = HealthCheckExecutor::new(store.clone(), config.health_check.clone());

        Self {
            store,
            composer,
            tracker,
            gateway,
            mutations,
            messages,
            firewall,
            health,
        }
    }
}

/// Build the in-memory store, load the configured seed and wire the services.
pub async fn bootstrap(config: &ControlConfig) -> EdgeResult<Components> {
    let store = MemoryStore::new();
    if let Some(path) = &config.store.seed_path {
        tracing::info!(path = ?path, "Loading entity seed");
        let seed = Seed::from_file(path)?;
        store.load_seed(seed).await?;
    }

    let store: Arc<dyn EntityStore> = Arc::new(store);
    let messages: Arc<dyn MessageSink> = Arc::new(MemoryMessageSink::new());
    Ok(Components::new(store, messages, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EdgeError;
    use crate::store::StoreError;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_bootstrap_without_seed() {
        let components = bootstrap(&ControlConfig::default()).await.unwrap();
        assert!(components.store.find_pending_node_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_seed_is_fatal() {
        let mut config = ControlConfig::default();
        config.store.seed_path = Some(PathBuf::from("/nonexistent/seed.json"));
        let err = bootstrap(&config).await.err().unwrap();
        assert!(matches!(err, EdgeError::Store(StoreError::Io(_))));
    }
}
