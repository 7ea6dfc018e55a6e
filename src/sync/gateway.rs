//! Node-facing sync operations.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compose::{ComposeCache, ComposedConfig, Composer, NodeConfig};
use crate::error::{require_id, EdgeError, EdgeResult};
use crate::model::EntityKind;
use crate::observability::metrics;
use crate::store::{EntityStore, NodeVersion};

/// What `list_pending` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingScope {
    #[default]
    Nodes,
    Clusters,
}

impl FromStr for PendingScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nodes" | "node" => Ok(PendingScope::Nodes),
            "clusters" | "cluster" => Ok(PendingScope::Clusters),
            other => Err(format!("unknown pending scope '{}'", other)),
        }
    }
}

/// A node config together with the version it was composed at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub version: u64,
    pub config: NodeConfig,
}

/// Read side used by polling edge nodes.
#[derive(Clone)]
pub struct SyncGateway {
    store: Arc<dyn EntityStore>,
    composer: Composer,
}

impl SyncGateway {
    pub fn new(store: Arc<dyn EntityStore>, composer: Composer) -> Self {
        Self { store, composer }
    }

    /// Ids of pending nodes, or of enabled clusters owning a pending node.
    pub async fn list_pending(&self, scope: PendingScope) -> EdgeResult<BTreeSet<i64>> {
        let node_ids = self.store.find_pending_node_ids().await?;
        metrics::set_pending_nodes(node_ids.len());

        match scope {
            PendingScope::Nodes => Ok(node_ids.into_iter().collect()),
            PendingScope::Clusters => {
                let mut clusters = BTreeSet::new();
                for node_id in node_ids {
                    let Some(node) = self.store.find_node(node_id).await? else {
                        continue;
                    };
                    if clusters.contains(&node.cluster_id) {
                        continue;
                    }
                    if let Some(cluster) = self.store.find_cluster(node.cluster_id).await? {
                        if cluster.state.is_enabled() {
                            clusters.insert(cluster.id);
                        }
                    }
                }
                Ok(clusters)
            }
        }
    }

    /// Compose `(kind, id)` with a fresh cache. Never clears pending state.
    pub async fn fetch(&self, kind: EntityKind, id: i64) -> EdgeResult<Option<ComposedConfig>> {
        require_id("id", id)?;
        let cache = ComposeCache::new();
        self.composer.compose(kind, id, &cache).await
    }

    /// Compose a node's config, stamped with the version read before composing.
    pub async fn fetch_node(&self, node_id: i64) -> EdgeResult<Option<NodeSnapshot>> {
        require_id("node_id", node_id)?;
        let version = self.store.find_node_version(node_id).await?.version;
        let cache = ComposeCache::new();
        let config = match self.composer.compose(EntityKind::Node, node_id, &cache).await? {
            Some(ComposedConfig::Node(config)) => Some(config),
            _ => None,
        };

        tracing::debug!(node_id, version, found = config.is_some(), "Node config fetched");
        Ok(config.map(|config| NodeSnapshot { version, config }))
    }

    /// Record the config version a node applied.
    pub async fn ack_node(&self, node_id: i64, version: u64) -> EdgeResult<NodeVersion> {
        require_id("node_id", node_id)?;
        if self.store.find_node(node_id).await?.is_none() {
            return Err(EdgeError::NotFound {
                kind: EntityKind::Node,
                id: node_id,
            });
        }

        let acked = self.store.ack_node_version(node_id, version).await?;
        tracing::debug!(
            node_id,
            reported = version,
            applied = acked.applied,
            pending = acked.is_pending(),
            "Node acknowledged config"
        );
        Ok(acked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cluster, EntityRef, EntityState, Node};
    use crate::store::MemoryStore;

    async fn two_clusters() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for id in [1, 2] {
            store
                .save_cluster(Cluster {
                    id,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        for (id, cluster_id) in [(10, 1), (11, 1), (20, 2)] {
            store
                .save_node(Node {
                    id,
                    cluster_id,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        store
    }

    fn gateway(store: Arc<MemoryStore>) -> SyncGateway {
        SyncGateway::new(store.clone(), Composer::new(store))
    }

    #[tokio::test]
    async fn test_pending_scopes() {
        let store = two_clusters().await;
        store.mark_node_pending(10).await.unwrap();
        store.mark_node_pending(11).await.unwrap();
        store.mark_node_pending(20).await.unwrap();
        store
            .update_state(EntityRef::new(EntityKind::Cluster, 2), EntityState::Disabled)
            .await
            .unwrap();
        let gateway = gateway(store);

        let nodes = gateway.list_pending(PendingScope::Nodes).await.unwrap();
        assert_eq!(nodes, BTreeSet::from([10, 11, 20]));
        let clusters = gateway.list_pending(PendingScope::Clusters).await.unwrap();
        assert_eq!(clusters, BTreeSet::from([1]));
    }

    #[tokio::test]
    async fn test_fetch_does_not_clear_pending() {
        let store = two_clusters().await;
        store.mark_node_pending(10).await.unwrap();
        let gateway = gateway(store.clone());

        let snapshot = gateway.fetch_node(10).await.unwrap().unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.config.cluster_id, 1);
        assert_eq!(store.find_pending_node_ids().await.unwrap(), vec![10]);

        let acked = gateway.ack_node(10, snapshot.version).await.unwrap();
        assert!(!acked.is_pending());
        assert!(gateway.list_pending(PendingScope::Nodes).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ack_unknown_node() {
        let gateway = gateway(two_clusters().await);
        let err = gateway.ack_node(99, 1).await.unwrap_err();
        assert!(matches!(err, EdgeError::NotFound { id: 99, .. }));
    }

    #[tokio::test]
    async fn test_fetch_missing_is_none() {
        let gateway = gateway(two_clusters().await);
        assert!(gateway.fetch(EntityKind::Server, 99).await.unwrap().is_none());
        assert!(gateway.fetch_node(99).await.unwrap().is_none());
        assert!(gateway.fetch(EntityKind::Server, 0).await.is_err());
    }

    /// Counts `edge_compose_total` increments by label set.
    #[derive(Default)]
    struct ComposeCounts(std::sync::Mutex<std::collections::HashMap<String, Arc<std::sync::atomic::AtomicU64>>>);

    impl ComposeCounts {
        fn get(&self, labels: &str) -> u64 {
            let counts = self.0.lock().unwrap();
            counts
                .get(labels)
                .map_or(0, |c| c.load(std::sync::atomic::Ordering::SeqCst))
        }
    }

    impl ::metrics::Recorder for ComposeCounts {
        fn describe_counter(&self, _: ::metrics::KeyName, _: Option<::metrics::Unit>, _: ::metrics::SharedString) {}
        fn describe_gauge(&self, _: ::metrics::KeyName, _: Option<::metrics::Unit>, _: ::metrics::SharedString) {}
        fn describe_histogram(&self, _: ::metrics::KeyName, _: Option<::metrics::Unit>, _: ::metrics::SharedString) {}

        fn register_counter(&self, key: &::metrics::Key, _: &::metrics::Metadata<'_>) -> ::metrics::Counter {
            if key.name() != "edge_compose_total" {
                return ::metrics::Counter::noop();
            }
            let labels = key
                .labels()
                .map(|l| format!("{}={}", l.key(), l.value()))
                .collect::<Vec<_>>()
                .join(",");
            let counter = self.0.lock().unwrap().entry(labels).or_default().clone();
            ::metrics::Counter::from_arc(counter)
        }

        fn register_gauge(&self, _: &::metrics::Key, _: &::metrics::Metadata<'_>) -> ::metrics::Gauge {
            ::metrics::Gauge::noop()
        }

        fn register_histogram(&self, _: &::metrics::Key, _: &::metrics::Metadata<'_>) -> ::metrics::Histogram {
            ::metrics::Histogram::noop()
        }
    }

    #[tokio::test]
    async fn test_node_fetch_is_metered() {
        let recorder = ComposeCounts::default();
        let _guard = ::metrics::set_default_local_recorder(&recorder);
        let gateway = gateway(two_clusters().await);

        gateway.fetch_node(10).await.unwrap().unwrap();
        gateway.fetch_node(99).await.unwrap();

        assert_eq!(recorder.get("kind=node,outcome=composed"), 1);
        assert_eq!(recorder.get("kind=node,outcome=absent"), 1);
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("clusters".parse::<PendingScope>().unwrap(), PendingScope::Clusters);
        assert_eq!("Nodes".parse::<PendingScope>().unwrap(), PendingScope::Nodes);
        assert!("servers".parse::<PendingScope>().is_err());
    }
}
