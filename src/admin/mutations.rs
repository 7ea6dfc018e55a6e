//! Write-then-notify admin mutations.
//!
//! Every mutation writes through the store and then propagates the change.
//! When propagation fails after a successful write, the mutation reports the
//! propagation error; the write is not rolled back.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{require_id, EdgeError, EdgeResult};
use crate::model::{
    Cluster, Entity, EntityKind, EntityRef, EntityState, Node, Origin, ProxyProtocol, RawRef, ReverseProxy,
    ReverseProxyRef, Server, ServerGroup,
};
use crate::propagation::{ChangeTracker, NotifyReport};
use crate::store::EntityStore;

/// Result of a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub id: i64,
    pub propagation: NotifyReport,
}

/// Admin write path.
#[derive(Clone)]
pub struct MutationService {
    store: Arc<dyn EntityStore>,
    tracker: ChangeTracker,
}

impl MutationService {
    pub fn new(store: Arc<dyn EntityStore>, tracker: ChangeTracker) -> Self {
        Self { store, tracker }
    }

    pub async fn save_cluster(&self, cluster: Cluster) -> EdgeResult<MutationOutcome> {
        check_new_or_existing(&cluster)?;
        let id = self.store.save_cluster(cluster).await?;
        self.notify(EntityKind::Cluster, id).await
    }

    pub async fn save_node(&self, node: Node) -> EdgeResult<MutationOutcome> {
        check_new_or_existing(&node)?;
        let id = self.store.save_node(node).await?;
        self.notify(EntityKind::Node, id).await
    }

    /// Save a server. Moving it to another cluster also notifies the cluster
    /// it left.
    pub async fn save_server(&self, server: Server) -> EdgeResult<MutationOutcome> {
        check_new_or_existing(&server)?;
        let previous_cluster = match server.id {
            id if id > 0 => self.store.find_server(id).await?.map(|s| s.cluster_id),
            _ => None,
        };
        let cluster_id = server.cluster_id;

        let id = self.store.save_server(server).await?;
        let mut outcome = self.notify(EntityKind::Server, id).await?;

        if let Some(old) = previous_cluster.filter(|old| *old > 0 && *old != cluster_id) {
            let report = self.tracker.notify_update(EntityKind::Cluster, old).await?;
            outcome.propagation.marked.extend(report.marked);
        }
        Ok(outcome)
    }

    pub async fn save_group(&self, group: ServerGroup) -> EdgeResult<MutationOutcome> {
        check_new_or_existing(&group)?;
        let id = self.store.save_server_group(group).await?;
        self.notify(EntityKind::ServerGroup, id).await
    }

    pub async fn save_reverse_proxy(&self, reverse_proxy: ReverseProxy) -> EdgeResult<MutationOutcome> {
        check_new_or_existing(&reverse_proxy)?;
        let id = self.store.save_reverse_proxy(reverse_proxy).await?;
        self.notify(EntityKind::ReverseProxy, id).await
    }

    pub async fn save_origin(&self, origin: Origin) -> EdgeResult<MutationOutcome> {
        check_new_or_existing(&origin)?;
        let id = self.store.save_origin(origin).await?;
        self.notify(EntityKind::Origin, id).await
    }

    /// Set or clear (`None`) one reverse-proxy reference of a group.
    pub async fn update_group_reverse_proxy(
        &self,
        group_id: i64,
        protocol: ProxyProtocol,
        reference: Option<ReverseProxyRef>,
    ) -> EdgeResult<MutationOutcome> {
        require_id("group_id", group_id)?;
        let mut group = self
            .store
            .find_server_group(group_id)
            .await?
            .ok_or(EdgeError::NotFound {
                kind: EntityKind::ServerGroup,
                id: group_id,
            })?;

        let raw = match reference {
            Some(r) if r.reverse_proxy_id < 0 => {
                return Err(EdgeError::validation(
                    "reverse_proxy_id",
                    format!("expected a non-negative id, got {}", r.reverse_proxy_id),
                ));
            }
            Some(r) => RawRef::encode(&r).map_err(|e| EdgeError::validation("reverse_proxy_ref", e.to_string()))?,
            None => RawRef::default(),
        };
        group.set_reverse_proxy_ref(protocol, raw);

        tracing::info!(group_id, protocol = protocol.as_str(), "Updating group reverse proxy");
        self.store.save_server_group(group).await?;
        self.notify(EntityKind::ServerGroup, group_id).await
    }

    /// Rank groups by position: the first id gets the highest order.
    /// Every id is checked before any group is written.
    pub async fn update_group_orders(&self, group_ids: &[i64]) -> EdgeResult<NotifyReport> {
        let count = i32::try_from(group_ids.len())
            .map_err(|_| EdgeError::validation("group_ids", format!("too many groups: {}", group_ids.len())))?;
        let mut groups = Vec::with_capacity(group_ids.len());
        for (index, &group_id) in group_ids.iter().enumerate() {
            require_id("group_ids", group_id)?;
            if group_ids[..index].contains(&group_id) {
                return Err(EdgeError::validation("group_ids", format!("group {} listed twice", group_id)));
            }
            let group = self
                .store
                .find_server_group(group_id)
                .await?
                .ok_or(EdgeError::NotFound {
                    kind: EntityKind::ServerGroup,
                    id: group_id,
                })?;
            groups.push(group);
        }

        let mut report = NotifyReport::default();
        for (rank, mut group) in (0..count).rev().map(|r| r + 1).zip(groups) {
            group.order = rank;
            let id = self.store.save_server_group(group).await?;
            let propagated = self.tracker.notify_update(EntityKind::ServerGroup, id).await?;
            report.marked.extend(propagated.marked);
            report.failed.extend(propagated.failed);
        }
        tracing::info!(groups = group_ids.len(), marked = report.marked.len(), "Group orders updated");
        Ok(report)
    }

    /// Enable or disable an entity.
    pub async fn set_state(&self, kind: EntityKind, id: i64, enabled: bool) -> EdgeResult<MutationOutcome> {
        require_id("id", id)?;
        let state = if enabled {
            EntityState::Enabled
        } else {
            EntityState::Disabled
        };

        if !self.store.update_state(EntityRef::new(kind, id), state).await? {
            return Err(EdgeError::NotFound { kind, id });
        }
        tracing::info!(kind = %kind, id, enabled, "Entity state changed");
        self.notify(kind, id).await
    }

    async fn notify(&self, kind: EntityKind, id: i64) -> EdgeResult<MutationOutcome> {
        let propagation = self.tracker.notify_update(kind, id).await?;
        Ok(MutationOutcome { id, propagation })
    }
}

fn check_new_or_existing<T: Entity>(record: &T) -> EdgeResult<()> {
    if record.id() < 0 {
        return Err(EdgeError::validation(
            "id",
            format!("expected 0 for a new {} or a positive id, got {}", T::KIND, record.id()),
        ));
    }
    if record.id() == i64::MAX {
        return Err(EdgeError::validation("id", format!("{} id {} is out of range", T::KIND, record.id())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service(store: Arc<MemoryStore>) -> MutationService {
        MutationService::new(store.clone(), ChangeTracker::new(store))
    }

    async fn cluster_with_node(store: &MemoryStore, cluster_id: i64, node_id: i64) {
        store
            .save_cluster(Cluster {
                id: cluster_id,
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .save_node(Node {
                id: node_id,
                cluster_id,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_save_assigns_id_and_notifies() {
        let store = Arc::new(MemoryStore::new());
        cluster_with_node(&store, 1, 10).await;
        let service = service(store.clone());

        let outcome = service
            .save_server(Server {
                cluster_id: 1,
                name: "shop".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(outcome.id > 0);
        assert!(outcome.propagation.marked.contains(&10));
    }

    #[tokio::test]
    async fn test_moving_server_notifies_both_clusters() {
        let store = Arc::new(MemoryStore::new());
        cluster_with_node(&store, 1, 10).await;
        cluster_with_node(&store, 2, 20).await;
        store
            .save_server(Server {
                id: 5,
                cluster_id: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        let service = service(store.clone());

        let outcome = service
            .save_server(Server {
                id: 5,
                cluster_id: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(outcome.propagation.marked.iter().copied().collect::<Vec<_>>(), vec![10, 20]);
    }

    #[tokio::test]
    async fn test_negative_id_is_rejected() {
        let service = service(Arc::new(MemoryStore::new()));
        let err = service
            .save_origin(Origin {
                id: -1,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EdgeError::Validation { field: "id", .. }));
    }

    #[tokio::test]
    async fn test_maximal_id_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());
        let err = service
            .save_origin(Origin {
                id: i64::MAX,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EdgeError::Validation { field: "id", .. }));

        let created = service.save_origin(Origin::default()).await.unwrap();
        assert!(created.id > 0);
    }

    #[tokio::test]
    async fn test_group_orders_follow_position() {
        let store = Arc::new(MemoryStore::new());
        for id in [3, 4, 5] {
            store
                .save_server_group(ServerGroup {
                    id,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let service = service(store.clone());

        service.update_group_orders(&[5, 3, 4]).await.unwrap();
        let mut orders = Vec::new();
        for id in [5, 3, 4] {
            orders.push(store.find_server_group(id).await.unwrap().unwrap().order);
        }
        assert_eq!(orders, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_group_orders_reject_before_writing() {
        let store = Arc::new(MemoryStore::new());
        store
            .save_server_group(ServerGroup {
                id: 3,
                ..Default::default()
            })
            .await
            .unwrap();
        let service = service(store.clone());

        let err = service.update_group_orders(&[3, 99]).await.unwrap_err();
        assert!(matches!(err, EdgeError::NotFound { id: 99, .. }));
        let err = service.update_group_orders(&[3, 3]).await.unwrap_err();
        assert!(matches!(err, EdgeError::Validation { field: "group_ids", .. }));
        assert_eq!(store.find_server_group(3).await.unwrap().unwrap().order, 0);
    }

    #[tokio::test]
    async fn test_set_state_of_missing_entity() {
        let service = service(Arc::new(MemoryStore::new()));
        let err = service.set_state(EntityKind::Origin, 3, false).await.unwrap_err();
        assert!(matches!(err, EdgeError::NotFound { id: 3, .. }));
    }

    #[tokio::test]
    async fn test_update_group_reverse_proxy() {
        let store = Arc::new(MemoryStore::new());
        store
            .save_server_group(ServerGroup {
                id: 3,
                ..Default::default()
            })
            .await
            .unwrap();
        let service = service(store.clone());

        service
            .update_group_reverse_proxy(3, ProxyProtocol::Tcp, Some(ReverseProxyRef::new(7)))
            .await
            .unwrap();
        let parents = store
            .find_parents(EntityRef::new(EntityKind::ReverseProxy, 7))
            .await
            .unwrap();
        assert_eq!(parents, vec![EntityRef::new(EntityKind::ServerGroup, 3)]);

        service.update_group_reverse_proxy(3, ProxyProtocol::Tcp, None).await.unwrap();
        let group = store.find_server_group(3).await.unwrap().unwrap();
        assert!(group.tcp_reverse_proxy.is_empty());

        let err = service
            .update_group_reverse_proxy(4, ProxyProtocol::Http, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EdgeError::NotFound { .. }));
    }
}
