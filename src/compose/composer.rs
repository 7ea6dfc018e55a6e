//! Recursive configuration composer.
//!
//! # Responsibilities
//! - Resolve an entity and everything it references into one config tree
//! - Consult the request cache before every store read
//! - Treat missing or disabled entities as absent, never as errors
//! - Abort the whole composition on malformed stored references
//!
//! # Design Decisions
//! - One generic entry point (`compose`) over a closed set of kinds, with
//!   typed entry points underneath
//! - HTTP/TCP/UDP proxy references share a single resolution path
//! - The cache placeholder is written before recursing, so a cycle in the
//!   reference graph terminates as absent

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;

use crate::compose::cache::{ComposeCache, Lookup};
use crate::compose::configs::{
    ClusterConfig, Composed, ComposedConfig, NodeConfig, OriginConfig, ReverseProxyConfig, ReverseProxySlots,
    ServerConfig, ServerGroupConfig,
};
use crate::error::{EdgeError, EdgeResult};
use crate::model::{EntityKind, EntityRef, OriginRef, ProxyProtocol, RawRef, ReverseProxyRef};
use crate::observability::metrics;
use crate::store::EntityStore;

/// Builds composed configs from the entity store.
#[derive(Clone)]
pub struct Composer {
    store: Arc<dyn EntityStore>,
}

impl Composer {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Compose any kind of entity. `Ok(None)` means missing or disabled.
    pub async fn compose(&self, kind: EntityKind, id: i64, cache: &ComposeCache) -> EdgeResult<Option<ComposedConfig>> {
        let started = Instant::now();
        let result = match kind {
            EntityKind::Cluster => self.compose_cluster(id, cache).await.map(|c| c.map(Into::into)),
            EntityKind::Node => self.compose_node(id, cache).await.map(|c| c.map(Into::into)),
            EntityKind::Server => self.compose_server(id, cache).await.map(|c| c.map(Into::into)),
            EntityKind::ServerGroup => self.compose_group(id, cache).await.map(|c| c.map(Into::into)),
            EntityKind::ReverseProxy => self.compose_reverse_proxy(id, cache).await.map(|c| c.map(Into::into)),
            EntityKind::Origin => self.compose_origin(id, cache).await.map(|c| c.map(Into::into)),
        };

        let outcome = match &result {
            Ok(Some(_)) => "composed",
            Ok(None) => "absent",
            Err(_) => "error",
        };
        metrics::record_compose(kind, outcome, started);
        tracing::debug!(
            kind = %kind,
            id,
            outcome,
            cached_keys = cache.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Composition finished"
        );
        result
    }

    pub async fn compose_origin(&self, id: i64, cache: &ComposeCache) -> EdgeResult<Option<OriginConfig>> {
        if let Some(resolved) = enter::<OriginConfig>(id, cache)? {
            return Ok(resolved);
        }
        let result = self.build_origin(id).await;
        leave(id, cache, result)
    }

    pub async fn compose_reverse_proxy(&self, id: i64, cache: &ComposeCache) -> EdgeResult<Option<ReverseProxyConfig>> {
        if let Some(resolved) = enter::<ReverseProxyConfig>(id, cache)? {
            return Ok(resolved);
        }
        let result = self.build_reverse_proxy(id, cache).await;
        leave(id, cache, result)
    }

    pub async fn compose_group(&self, id: i64, cache: &ComposeCache) -> EdgeResult<Option<ServerGroupConfig>> {
        if let Some(resolved) = enter::<ServerGroupConfig>(id, cache)? {
            return Ok(resolved);
        }
        let result = self.build_group(id, cache).await;
        leave(id, cache, result)
    }

    pub async fn compose_server(&self, id: i64, cache: &ComposeCache) -> EdgeResult<Option<ServerConfig>> {
        if let Some(resolved) = enter::<ServerConfig>(id, cache)? {
            return Ok(resolved);
        }
        let result = self.build_server(id, cache).await;
        leave(id, cache, result)
    }

    pub async fn compose_cluster(&self, id: i64, cache: &ComposeCache) -> EdgeResult<Option<ClusterConfig>> {
        if let Some(resolved) = enter::<ClusterConfig>(id, cache)? {
            return Ok(resolved);
        }
        let result = self.build_cluster(id).await;
        leave(id, cache, result)
    }

    pub async fn compose_node(&self, id: i64, cache: &ComposeCache) -> EdgeResult<Option<NodeConfig>> {
        if let Some(resolved) = enter::<NodeConfig>(id, cache)? {
            return Ok(resolved);
        }
        let result = self.build_node(id, cache).await;
        leave(id, cache, result)
    }

    async fn build_origin(&self, id: i64) -> EdgeResult<Option<OriginConfig>> {
        let origin = match self.store.find_origin(id).await? {
            Some(o) if o.state.is_enabled() => o,
            _ => return Ok(None),
        };

        Ok(Some(OriginConfig {
            id: origin.id,
            is_on: origin.is_on,
            name: origin.name,
            description: origin.description,
            addr: origin.addr,
            weight: origin.weight,
            conn_timeout: origin.conn_timeout,
            read_timeout: origin.read_timeout,
            idle_timeout: origin.idle_timeout,
            max_conns: origin.max_conns,
            max_idle_conns: origin.max_idle_conns,
            domains: origin.domains,
        }))
    }

    async fn build_reverse_proxy(&self, id: i64, cache: &ComposeCache) -> EdgeResult<Option<ReverseProxyConfig>> {
        let rp = match self.store.find_reverse_proxy(id).await? {
            Some(rp) if rp.state.is_enabled() => rp,
            _ => return Ok(None),
        };
        let owner = EntityRef::new(EntityKind::ReverseProxy, rp.id);

        let scheduling = decode_ref(owner, "scheduling", &rp.scheduling)?;
        let primary_refs: Vec<OriginRef> = decode_ref(owner, "primary_origins", &rp.primary_origins)?.unwrap_or_default();
        let backup_refs: Vec<OriginRef> = decode_ref(owner, "backup_origins", &rp.backup_origins)?.unwrap_or_default();

        let primary_origins = self.compose_origin_list(&primary_refs, cache).await?;
        let backup_origins = self.compose_origin_list(&backup_refs, cache).await?;

        Ok(Some(ReverseProxyConfig {
            id: rp.id,
            is_on: rp.is_on,
            scheduling,
            primary_origin_refs: primary_refs,
            backup_origin_refs: backup_refs,
            primary_origins,
            backup_origins,
            request_host: rp.request_host,
            strip_prefix: rp.strip_prefix,
        }))
    }

    async fn compose_origin_list(&self, refs: &[OriginRef], cache: &ComposeCache) -> EdgeResult<Vec<OriginConfig>> {
        let mut origins = Vec::with_capacity(refs.len());
        for r in refs.iter().filter(|r| r.is_on) {
            if let Some(origin) = self.compose_origin(r.origin_id, cache).await? {
                origins.push(origin);
            }
        }
        Ok(origins)
    }

    async fn build_group(&self, id: i64, cache: &ComposeCache) -> EdgeResult<Option<ServerGroupConfig>> {
        let group = match self.store.find_server_group(id).await? {
            Some(g) if g.state.is_enabled() => g,
            _ => return Ok(None),
        };
        let owner = EntityRef::new(EntityKind::ServerGroup, group.id);
        let refs = ProxyProtocol::ALL.map(|p| (p, group.reverse_proxy_ref(p)));
        let proxies = self.compose_proxy_slots(owner, refs, cache).await?;

        Ok(Some(ServerGroupConfig {
            id: group.id,
            name: group.name,
            is_on: group.is_on,
            order: group.order,
            proxies,
        }))
    }

    async fn build_server(&self, id: i64, cache: &ComposeCache) -> EdgeResult<Option<ServerConfig>> {
        let server = match self.store.find_server(id).await? {
            Some(s) if s.state.is_enabled() => s,
            _ => return Ok(None),
        };
        let owner = EntityRef::new(EntityKind::Server, server.id);

        let refs = ProxyProtocol::ALL.map(|p| (p, server.reverse_proxy_ref(p)));
        let proxies = self.compose_proxy_slots(owner, refs, cache).await?;

        let group_ids: Vec<i64> = decode_ref(owner, "group_ids", &server.group_ids)?.unwrap_or_default();
        let mut groups = Vec::with_capacity(group_ids.len());
        for group_id in group_ids {
            if let Some(group) = self.compose_group(group_id, cache).await? {
                groups.push(group);
            }
        }
        // Higher order first; equal orders keep reference order.
        groups.sort_by(|a, b| b.order.cmp(&a.order));

        Ok(Some(ServerConfig {
            id: server.id,
            cluster_id: server.cluster_id,
            name: server.name,
            is_on: server.is_on,
            server_type: server.server_type,
            proxies,
            groups,
        }))
    }

    async fn build_cluster(&self, id: i64) -> EdgeResult<Option<ClusterConfig>> {
        let cluster = match self.store.find_cluster(id).await? {
            Some(c) if c.state.is_enabled() => c,
            _ => return Ok(None),
        };
        let owner = EntityRef::new(EntityKind::Cluster, cluster.id);

        Ok(Some(ClusterConfig {
            id: cluster.id,
            api_node_ids: decode_ref(owner, "api_nodes", &cluster.api_nodes)?.unwrap_or_default(),
            health_check: decode_ref(owner, "health_check", &cluster.health_check)?,
            name: cluster.name,
            install_dir: cluster.install_dir,
            use_all_api_nodes: cluster.use_all_api_nodes,
        }))
    }

    async fn build_node(&self, id: i64, cache: &ComposeCache) -> EdgeResult<Option<NodeConfig>> {
        let node = match self.store.find_node(id).await? {
            Some(n) if n.state.is_enabled() => n,
            _ => return Ok(None),
        };
        let owner = EntityRef::new(EntityKind::Node, node.id);
        let access_addrs: Vec<String> = decode_ref(owner, "access_addrs", &node.access_addrs)?.unwrap_or_default();

        let cluster = self.compose_cluster(node.cluster_id, cache).await?;
        let mut servers = Vec::new();
        if cluster.is_some() {
            for server_id in self.store.find_enabled_server_ids_with_cluster(node.cluster_id).await? {
                if let Some(server) = self.compose_server(server_id, cache).await? {
                    servers.push(server);
                }
            }
        }

        Ok(Some(NodeConfig {
            id: node.id,
            name: node.name,
            is_on: node.is_on,
            cluster_id: node.cluster_id,
            access_addrs,
            cluster,
            servers,
        }))
    }

    /// Resolve the HTTP/TCP/UDP reverse-proxy references of one owner.
    async fn compose_proxy_slots(
        &self,
        owner: EntityRef,
        refs: [(ProxyProtocol, &RawRef); 3],
        cache: &ComposeCache,
    ) -> EdgeResult<ReverseProxySlots> {
        let mut slots = ReverseProxySlots::default();
        for (protocol, raw) in refs {
            let reference: ReverseProxyRef = match decode_ref(owner, protocol.field_name(), raw)? {
                Some(r) => r,
                None => continue,
            };
            let config = self.compose_reverse_proxy(reference.reverse_proxy_id, cache).await?;
            slots.set(protocol, reference, config);
        }
        Ok(slots)
    }
}

/// Resolve from the cache if possible. `Some(..)` means done; `None` means the
/// caller must build, with the placeholder already in place.
fn enter<T: Composed>(id: i64, cache: &ComposeCache) -> EdgeResult<Option<Option<T>>> {
    if id <= 0 {
        return Ok(Some(None));
    }
    match cache.lookup::<T>(id)? {
        Lookup::Hit(config) => Ok(Some(Some(config))),
        Lookup::Absent => Ok(Some(None)),
        Lookup::Miss => {
            cache.begin::<T>(id);
            Ok(None)
        }
    }
}

/// Record the outcome of a build in the cache.
fn leave<T: Composed>(id: i64, cache: &ComposeCache, result: EdgeResult<Option<T>>) -> EdgeResult<Option<T>> {
    match result {
        Ok(Some(config)) => {
            cache.store(id, &config);
            Ok(Some(config))
        }
        Ok(None) => {
            cache.store_absent::<T>(id);
            Ok(None)
        }
        Err(e) => {
            cache.abandon::<T>(id);
            Err(e)
        }
    }
}

fn decode_ref<T: DeserializeOwned>(owner: EntityRef, field: &'static str, raw: &RawRef) -> EdgeResult<Option<T>> {
    raw.decode().map_err(|source| EdgeError::Decode {
        kind: owner.kind,
        id: owner.id,
        field,
        source,
    })
}
