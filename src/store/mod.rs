//! Entity store boundary.
//!
//! # Data Flow
//! ```text
//! admin mutation → save_* / update_state → records + edge index
//! composer       → find_* point reads (state checked by the caller)
//! tracker        → find_parents / find_enabled_node_ids_with_cluster
//!                → mark_node_pending (version bump)
//! node ack       → ack_node_version
//! ```
//!
//! # Design Decisions
//! - The store is injected as `Arc<dyn EntityStore>`; no process-wide handles
//! - Point reads return records in any state; callers decide what "enabled" means
//! - Pending state is a per-node version pair, not a boolean flag

pub mod index;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Cluster, EntityRef, EntityState, Node, Origin, ReverseProxy, Server, ServerGroup};

pub use index::EdgeIndex;
pub use memory::{MemoryStore, Seed};

/// Errors raised by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A query or write failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Reading a seed file failed.
    #[error("Seed I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A seed file was not valid JSON.
    #[error("Seed parse error: {0}")]
    Seed(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Configuration version bookkeeping of one node.
///
/// `version` is bumped by propagation; `applied` is the last version the node
/// acknowledged. The node is pending while `version > applied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeVersion {
    pub version: u64,
    pub applied: u64,
}

impl NodeVersion {
    pub fn is_pending(&self) -> bool {
        self.version > self.applied
    }
}

/// Durable storage consumed by the composer, tracker and gateway.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_cluster(&self, id: i64) -> StoreResult<Option<Cluster>>;
    async fn find_node(&self, id: i64) -> StoreResult<Option<Node>>;
    async fn find_server(&self, id: i64) -> StoreResult<Option<Server>>;
    async fn find_server_group(&self, id: i64) -> StoreResult<Option<ServerGroup>>;
    async fn find_reverse_proxy(&self, id: i64) -> StoreResult<Option<ReverseProxy>>;
    async fn find_origin(&self, id: i64) -> StoreResult<Option<Origin>>;

    /// Ids of enabled nodes in a cluster, ascending.
    async fn find_enabled_node_ids_with_cluster(&self, cluster_id: i64) -> StoreResult<Vec<i64>>;

    /// Ids of enabled servers deployed to a cluster, ascending.
    async fn find_enabled_server_ids_with_cluster(&self, cluster_id: i64) -> StoreResult<Vec<i64>>;

    /// Enabled entities whose references point at `child`.
    async fn find_parents(&self, child: EntityRef) -> StoreResult<Vec<EntityRef>>;

    /// Insert or replace a record. Id 0 assigns a new id. Returns the id.
    async fn save_cluster(&self, cluster: Cluster) -> StoreResult<i64>;
    async fn save_node(&self, node: Node) -> StoreResult<i64>;
    async fn save_server(&self, server: Server) -> StoreResult<i64>;
    async fn save_server_group(&self, group: ServerGroup) -> StoreResult<i64>;
    async fn save_reverse_proxy(&self, reverse_proxy: ReverseProxy) -> StoreResult<i64>;
    async fn save_origin(&self, origin: Origin) -> StoreResult<i64>;

    /// Change the state of a record. Returns false when it does not exist.
    async fn update_state(&self, target: EntityRef, state: EntityState) -> StoreResult<bool>;

    /// Bump a node's config version. Returns the new version.
    async fn mark_node_pending(&self, node_id: i64) -> StoreResult<u64>;

    /// Record the version a node applied. Versions beyond the current one are
    /// clamped; older acknowledgements never move `applied` backwards.
    async fn ack_node_version(&self, node_id: i64, version: u64) -> StoreResult<NodeVersion>;

    async fn find_node_version(&self, node_id: i64) -> StoreResult<NodeVersion>;

    /// Ids of enabled nodes with unacknowledged versions, ascending.
    async fn find_pending_node_ids(&self) -> StoreResult<Vec<i64>>;
}
