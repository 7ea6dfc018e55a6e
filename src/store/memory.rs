//! In-memory entity store.
//!
//! Backs the binary when no external database is wired in, and every test.
//! Records live behind one `RwLock` so a save and its edge-index update are
//! observed together; node versions live in a `DashMap` because propagation
//! bumps them concurrently with reads.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::model::{
    Cluster, Entity, EntityKind, EntityRef, EntityState, Node, Origin, ReverseProxy, Server, ServerGroup,
};
use crate::store::index::EdgeIndex;
use crate::store::{EntityStore, NodeVersion, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    clusters: HashMap<i64, Cluster>,
    nodes: HashMap<i64, Node>,
    servers: HashMap<i64, Server>,
    groups: HashMap<i64, ServerGroup>,
    reverse_proxies: HashMap<i64, ReverseProxy>,
    origins: HashMap<i64, Origin>,
    edges: EdgeIndex,
}

impl Tables {
    fn state_of(&self, target: EntityRef) -> Option<EntityState> {
        match target.kind {
            EntityKind::Cluster => self.clusters.get(&target.id).map(Entity::state),
            EntityKind::Node => self.nodes.get(&target.id).map(Entity::state),
            EntityKind::Server => self.servers.get(&target.id).map(Entity::state),
            EntityKind::ServerGroup => self.groups.get(&target.id).map(Entity::state),
            EntityKind::ReverseProxy => self.reverse_proxies.get(&target.id).map(Entity::state),
            EntityKind::Origin => self.origins.get(&target.id).map(Entity::state),
        }
    }

    fn is_enabled(&self, target: EntityRef) -> bool {
        self.state_of(target).is_some_and(|s| s.is_enabled())
    }
}

/// Table selection per entity type.
trait Table: Entity {
    fn table(tables: &Tables) -> &HashMap<i64, Self>;
    fn table_mut(tables: &mut Tables) -> &mut HashMap<i64, Self>;
}

macro_rules! impl_table {
    ($ty:ty, $field:ident) => {
        impl Table for $ty {
            fn table(tables: &Tables) -> &HashMap<i64, Self> {
                &tables.$field
            }

            fn table_mut(tables: &mut Tables) -> &mut HashMap<i64, Self> {
                &mut tables.$field
            }
        }
    };
}

impl_table!(Cluster, clusters);
impl_table!(Node, nodes);
impl_table!(Server, servers);
impl_table!(ServerGroup, groups);
impl_table!(ReverseProxy, reverse_proxies);
impl_table!(Origin, origins);

/// Initial records loaded at startup.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Seed {
    pub clusters: Vec<Cluster>,
    pub nodes: Vec<Node>,
    pub servers: Vec<Server>,
    pub groups: Vec<ServerGroup>,
    pub reverse_proxies: Vec<ReverseProxy>,
    pub origins: Vec<Origin>,
}

impl Seed {
    /// Read a seed document from a JSON file.
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Thread-safe in-memory [`EntityStore`].
pub struct MemoryStore {
    tables: RwLock<Tables>,
    next_id: AtomicI64,
    versions: DashMap<i64, NodeVersion>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_id: AtomicI64::new(1),
            versions: DashMap::new(),
        }
    }

    /// Insert every record of a seed document.
    pub async fn load_seed(&self, seed: Seed) -> StoreResult<()> {
        let Seed {
            clusters,
            nodes,
            servers,
            groups,
            reverse_proxies,
            origins,
        } = seed;
        let count = clusters.len() + nodes.len() + servers.len() + groups.len() + reverse_proxies.len() + origins.len();

        for r in clusters {
            self.save(r).await?;
        }
        for r in nodes {
            self.save(r).await?;
        }
        for r in servers {
            self.save(r).await?;
        }
        for r in groups {
            self.save(r).await?;
        }
        for r in reverse_proxies {
            self.save(r).await?;
        }
        for r in origins {
            self.save(r).await?;
        }

        tracing::info!(records = count, "Seed loaded into memory store");
        Ok(())
    }

    /// Number of ownership edges currently indexed.
    pub async fn edge_count(&self) -> usize {
        self.tables.read().await.edges.edge_count()
    }

    async fn find<T: Table>(&self, id: i64) -> Option<T> {
        let tables = self.tables.read().await;
        T::table(&tables).get(&id).cloned()
    }

    async fn save<T: Table>(&self, mut record: T) -> StoreResult<i64> {
        let mut tables = self.tables.write().await;
        if record.id() <= 0 {
            record.set_id(self.allocate_id()?);
        } else {
            let next = record.id().checked_add(1).ok_or_else(|| {
                StoreError::Query(format!("{} id {} leaves no room for new ids", T::KIND, record.id()))
            })?;
            self.next_id.fetch_max(next, Ordering::SeqCst);
        }

        let id = record.id();
        tables.edges.replace(record.entity_ref(), record.declared_edges());
        T::table_mut(&mut tables).insert(id, record);
        Ok(id)
    }

    /// Hand out the next free id. Ids never wrap.
    fn allocate_id(&self) -> StoreResult<i64> {
        self.next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| next.checked_add(1))
            .map_err(|_| StoreError::Query("entity id space exhausted".to_string()))
    }

    fn set_state_in<T: Table>(tables: &mut Tables, id: i64, state: EntityState) -> bool {
        match T::table_mut(tables).get_mut(&id) {
            Some(record) => {
                record.set_state(state);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_cluster(&self, id: i64) -> StoreResult<Option<Cluster>> {
        Ok(self.find(id).await)
    }

    async fn find_node(&self, id: i64) -> StoreResult<Option<Node>> {
        Ok(self.find(id).await)
    }

    async fn find_server(&self, id: i64) -> StoreResult<Option<Server>> {
        Ok(self.find(id).await)
    }

    async fn find_server_group(&self, id: i64) -> StoreResult<Option<ServerGroup>> {
        Ok(self.find(id).await)
    }

    async fn find_reverse_proxy(&self, id: i64) -> StoreResult<Option<ReverseProxy>> {
        Ok(self.find(id).await)
    }

    async fn find_origin(&self, id: i64) -> StoreResult<Option<Origin>> {
        Ok(self.find(id).await)
    }

    async fn find_enabled_node_ids_with_cluster(&self, cluster_id: i64) -> StoreResult<Vec<i64>> {
        let tables = self.tables.read().await;
        let mut ids: Vec<i64> = tables
            .nodes
            .values()
            .filter(|n| n.cluster_id == cluster_id && n.state.is_enabled())
            .map(|n| n.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn find_enabled_server_ids_with_cluster(&self, cluster_id: i64) -> StoreResult<Vec<i64>> {
        let tables = self.tables.read().await;
        let mut ids: Vec<i64> = tables
            .servers
            .values()
            .filter(|s| s.cluster_id == cluster_id && s.state.is_enabled())
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn find_parents(&self, child: EntityRef) -> StoreResult<Vec<EntityRef>> {
        let tables = self.tables.read().await;
        Ok(tables
            .edges
            .parents_of(child)
            .into_iter()
            .filter(|parent| tables.is_enabled(*parent))
            .collect())
    }

    async fn save_cluster(&self, cluster: Cluster) -> StoreResult<i64> {
        self.save(cluster).await
    }

    async fn save_node(&self, node: Node) -> StoreResult<i64> {
        self.save(node).await
    }

    async fn save_server(&self, server: Server) -> StoreResult<i64> {
        self.save(server).await
    }

    async fn save_server_group(&self, group: ServerGroup) -> StoreResult<i64> {
        self.save(group).await
    }

    async fn save_reverse_proxy(&self, reverse_proxy: ReverseProxy) -> StoreResult<i64> {
        self.save(reverse_proxy).await
    }

    async fn save_origin(&self, origin: Origin) -> StoreResult<i64> {
        self.save(origin).await
    }

    async fn update_state(&self, target: EntityRef, state: EntityState) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let found = match target.kind {
            EntityKind::Cluster => Self::set_state_in::<Cluster>(&mut tables, target.id, state),
            EntityKind::Node => Self::set_state_in::<Node>(&mut tables, target.id, state),
            EntityKind::Server => Self::set_state_in::<Server>(&mut tables, target.id, state),
            EntityKind::ServerGroup => Self::set_state_in::<ServerGroup>(&mut tables, target.id, state),
            EntityKind::ReverseProxy => Self::set_state_in::<ReverseProxy>(&mut tables, target.id, state),
            EntityKind::Origin => Self::set_state_in::<Origin>(&mut tables, target.id, state),
        };
        Ok(found)
    }

    async fn mark_node_pending(&self, node_id: i64) -> StoreResult<u64> {
        let mut entry = self.versions.entry(node_id).or_default();
        entry.version += 1;
        Ok(entry.version)
    }

    async fn ack_node_version(&self, node_id: i64, version: u64) -> StoreResult<NodeVersion> {
        let mut entry = self.versions.entry(node_id).or_default();
        let acked = version.min(entry.version);
        if acked > entry.applied {
            entry.applied = acked;
        }
        Ok(*entry)
    }

    async fn find_node_version(&self, node_id: i64) -> StoreResult<NodeVersion> {
        Ok(self.versions.get(&node_id).map(|v| *v).unwrap_or_default())
    }

    async fn find_pending_node_ids(&self) -> StoreResult<Vec<i64>> {
        let pending: Vec<i64> = self
            .versions
            .iter()
            .filter(|entry| entry.value().is_pending())
            .map(|entry| *entry.key())
            .collect();

        let tables = self.tables.read().await;
        let mut ids: Vec<i64> = pending
            .into_iter()
            .filter(|id| tables.is_enabled(EntityRef::new(EntityKind::Node, *id)))
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
