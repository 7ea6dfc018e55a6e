//! Upward change propagation.
//!
//! # Responsibilities
//! - Walk the ownership graph from a changed entity to the nodes it reaches
//! - Bump the config version of every reached node once per call
//!
//! # Design Decisions
//! - Parents come from the store's edge index, never from scanning blobs
//! - Only enabled parents are followed; the changed entity itself always is
//! - A node id with no stored node reaches nothing
//! - A failed mark does not stop the fan-out; the first error is returned

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{require_id, EdgeError, EdgeResult};
use crate::model::{EntityKind, EntityRef};
use crate::observability::metrics;
use crate::store::EntityStore;

/// Outcome of one propagation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotifyReport {
    /// Nodes whose version was bumped.
    pub marked: BTreeSet<i64>,
    /// Nodes whose bump failed.
    pub failed: BTreeSet<i64>,
}

impl NotifyReport {
    pub fn is_noop(&self) -> bool {
        self.marked.is_empty() && self.failed.is_empty()
    }
}

/// Marks edge nodes pending when something they depend on changes.
#[derive(Clone)]
pub struct ChangeTracker {
    store: Arc<dyn EntityStore>,
}

impl ChangeTracker {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Propagate a change of `(kind, id)` to every affected node.
    ///
    /// Nodes marked before a failure stay marked. On failure the remaining
    /// nodes are still attempted and the first error is returned.
    pub async fn notify_update(&self, kind: EntityKind, id: i64) -> EdgeResult<NotifyReport> {
        require_id("id", id)?;
        let origin = EntityRef::new(kind, id);

        let nodes = self.affected_nodes(origin).await?;
        let mut report = NotifyReport::default();
        let mut first_error: Option<EdgeError> = None;

        for node_id in nodes {
            match self.store.mark_node_pending(node_id).await {
                Ok(version) => {
                    tracing::debug!(node_id, version, "Node marked pending");
                    report.marked.insert(node_id);
                }
                Err(e) => {
                    tracing::warn!(node_id, error = %e, changed = %origin, "Failed to mark node pending");
                    metrics::record_propagation_failure();
                    report.failed.insert(node_id);
                    first_error.get_or_insert(e.into());
                }
            }
        }

        metrics::record_nodes_marked(report.marked.len());
        tracing::info!(
            changed = %origin,
            marked = report.marked.len(),
            failed = report.failed.len(),
            "Change propagated"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Every node reachable upward from `origin`, deduplicated and ascending.
    pub async fn affected_nodes(&self, origin: EntityRef) -> EdgeResult<BTreeSet<i64>> {
        let mut nodes = BTreeSet::new();
        let mut visited = HashSet::from([origin]);
        let mut queue = VecDeque::from([origin]);

        while let Some(current) = queue.pop_front() {
            match current.kind {
                EntityKind::Node => {
                    if self.store.find_node(current.id).await?.is_some() {
                        nodes.insert(current.id);
                    }
                }
                EntityKind::Cluster => {
                    nodes.extend(self.store.find_enabled_node_ids_with_cluster(current.id).await?);
                }
                _ => {
                    for parent in self.store.find_parents(current).await? {
                        if visited.insert(parent) {
                            queue.push_back(parent);
                        }
                    }
                }
            }
        }

        Ok(nodes)
    }
}
