//! Normalized records as held by the entity store.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::model::kind::{EntityKind, EntityRef, EntityState};
use crate::model::refs::{OriginRef, ProxyProtocol, RawRef, ReverseProxyRef};
use crate::model::shared::{NetworkAddress, TimeDuration};

/// An ownership edge: `parent` references `child`, so a change to `child`
/// must be propagated to `parent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub child: EntityRef,
    pub parent: EntityRef,
}

/// Common behaviour of every stored record.
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn state(&self) -> EntityState;
    fn set_state(&mut self, state: EntityState);

    /// Edges this record declares through its own references.
    fn declared_edges(&self) -> Vec<Edge> {
        Vec::new()
    }

    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(Self::KIND, self.id())
    }
}

macro_rules! impl_entity {
    ($kind:expr) => {
        const KIND: EntityKind = $kind;

        fn id(&self) -> i64 {
            self.id
        }

        fn set_id(&mut self, id: i64) {
            self.id = id;
        }

        fn state(&self) -> EntityState {
            self.state
        }

        fn set_state(&mut self, state: EntityState) {
            self.state = state;
        }
    };
}

// Decodes a reference field for the edge index. Malformed text contributes no
// edges; composition reports it as an error later.
fn decode_for_index<T: DeserializeOwned>(owner: EntityRef, field: &str, raw: &RawRef) -> Option<T> {
    match raw.decode::<T>() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(entity = %owner, field, error = %e, "Malformed reference skipped by edge index");
            None
        }
    }
}

/// A group of nodes sharing servers and policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Cluster {
    pub id: i64,
    pub state: EntityState,
    pub name: String,
    pub install_dir: String,
    /// Nodes may talk to every API node instead of `api_nodes`.
    pub use_all_api_nodes: bool,
    /// JSON array of API node ids.
    pub api_nodes: RawRef,
    /// JSON [`crate::model::HealthCheckPolicy`].
    pub health_check: RawRef,
}

impl Entity for Cluster {
    impl_entity!(EntityKind::Cluster);
}

/// An edge node polling the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    pub id: i64,
    pub cluster_id: i64,
    pub state: EntityState,
    pub is_on: bool,
    pub name: String,
    /// JSON array of `host[:port]` strings the control plane can reach the node on.
    pub access_addrs: RawRef,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            id: 0,
            cluster_id: 0,
            state: EntityState::Enabled,
            is_on: true,
            name: String::new(),
            access_addrs: RawRef::default(),
        }
    }
}

impl Entity for Node {
    impl_entity!(EntityKind::Node);
}

/// Kind of service a server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerType {
    #[default]
    HttpProxy,
    HttpWeb,
    TcpProxy,
    UdpProxy,
}

/// A virtual service deployed on every node of its cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub id: i64,
    pub cluster_id: i64,
    pub state: EntityState,
    pub is_on: bool,
    pub name: String,
    pub server_type: ServerType,
    /// JSON array of server group ids.
    pub group_ids: RawRef,
    pub http_reverse_proxy: RawRef,
    pub tcp_reverse_proxy: RawRef,
    pub udp_reverse_proxy: RawRef,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            id: 0,
            cluster_id: 0,
            state: EntityState::Enabled,
            is_on: true,
            name: String::new(),
            server_type: ServerType::default(),
            group_ids: RawRef::default(),
            http_reverse_proxy: RawRef::default(),
            tcp_reverse_proxy: RawRef::default(),
            udp_reverse_proxy: RawRef::default(),
        }
    }
}

impl Server {
    pub fn reverse_proxy_ref(&self, protocol: ProxyProtocol) -> &RawRef {
        match protocol {
            ProxyProtocol::Http => &self.http_reverse_proxy,
            ProxyProtocol::Tcp => &self.tcp_reverse_proxy,
            ProxyProtocol::Udp => &self.udp_reverse_proxy,
        }
    }
}

impl Entity for Server {
    impl_entity!(EntityKind::Server);

    fn declared_edges(&self) -> Vec<Edge> {
        let me = self.entity_ref();
        let mut edges = Vec::new();

        if self.cluster_id > 0 {
            edges.push(Edge {
                child: me,
                parent: EntityRef::new(EntityKind::Cluster, self.cluster_id),
            });
        }

        let group_ids: Vec<i64> = decode_for_index(me, "group_ids", &self.group_ids).unwrap_or_default();
        for group_id in group_ids.into_iter().filter(|id| *id > 0) {
            edges.push(Edge {
                child: EntityRef::new(EntityKind::ServerGroup, group_id),
                parent: me,
            });
        }

        for protocol in ProxyProtocol::ALL {
            let raw = self.reverse_proxy_ref(protocol);
            if let Some(r) = decode_for_index::<ReverseProxyRef>(me, protocol.field_name(), raw) {
                if r.reverse_proxy_id > 0 {
                    edges.push(Edge { child: r.target(), parent: me });
                }
            }
        }
        edges
    }
}

/// A named set of servers sharing reverse-proxy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerGroup {
    pub id: i64,
    pub state: EntityState,
    pub is_on: bool,
    pub name: String,
    /// Higher sorts first.
    pub order: i32,
    pub http_reverse_proxy: RawRef,
    pub tcp_reverse_proxy: RawRef,
    pub udp_reverse_proxy: RawRef,
}

impl Default for ServerGroup {
    fn default() -> Self {
        Self {
            id: 0,
            state: EntityState::Enabled,
            is_on: true,
            name: String::new(),
            order: 0,
            http_reverse_proxy: RawRef::default(),
            tcp_reverse_proxy: RawRef::default(),
            udp_reverse_proxy: RawRef::default(),
        }
    }
}

impl ServerGroup {
    pub fn reverse_proxy_ref(&self, protocol: ProxyProtocol) -> &RawRef {
        match protocol {
            ProxyProtocol::Http => &self.http_reverse_proxy,
            ProxyProtocol::Tcp => &self.tcp_reverse_proxy,
            ProxyProtocol::Udp => &self.udp_reverse_proxy,
        }
    }

    pub fn set_reverse_proxy_ref(&mut self, protocol: ProxyProtocol, raw: RawRef) {
        match protocol {
            ProxyProtocol::Http => self.http_reverse_proxy = raw,
            ProxyProtocol::Tcp => self.tcp_reverse_proxy = raw,
            ProxyProtocol::Udp => self.udp_reverse_proxy = raw,
        }
    }
}

impl Entity for ServerGroup {
    impl_entity!(EntityKind::ServerGroup);

    fn declared_edges(&self) -> Vec<Edge> {
        let me = self.entity_ref();
        ProxyProtocol::ALL
            .iter()
            .filter_map(|protocol| {
                decode_for_index::<ReverseProxyRef>(me, protocol.field_name(), self.reverse_proxy_ref(*protocol))
            })
            .filter(|r| r.reverse_proxy_id > 0)
            .map(|r| Edge { child: r.target(), parent: me })
            .collect()
    }
}

/// A reverse-proxy chain: scheduling policy plus ordered origins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverseProxy {
    pub id: i64,
    pub state: EntityState,
    pub is_on: bool,
    /// JSON [`crate::model::SchedulingConfig`].
    pub scheduling: RawRef,
    /// JSON array of [`OriginRef`].
    pub primary_origins: RawRef,
    /// JSON array of [`OriginRef`], used when every primary origin is down.
    pub backup_origins: RawRef,
    pub request_host: String,
    pub strip_prefix: String,
}

impl Default for ReverseProxy {
    fn default() -> Self {
        Self {
            id: 0,
            state: EntityState::Enabled,
            is_on: true,
            scheduling: RawRef::default(),
            primary_origins: RawRef::default(),
            backup_origins: RawRef::default(),
            request_host: String::new(),
            strip_prefix: String::new(),
        }
    }
}

impl Entity for ReverseProxy {
    impl_entity!(EntityKind::ReverseProxy);

    fn declared_edges(&self) -> Vec<Edge> {
        let me = self.entity_ref();
        [("primary_origins", &self.primary_origins), ("backup_origins", &self.backup_origins)]
            .into_iter()
            .filter_map(|(field, raw)| decode_for_index::<Vec<OriginRef>>(me, field, raw))
            .flatten()
            .filter(|r| r.origin_id > 0)
            .map(|r| Edge { child: r.target(), parent: me })
            .collect()
    }
}

/// An upstream server that edge nodes fetch content from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Origin {
    pub id: i64,
    pub state: EntityState,
    pub is_on: bool,
    pub name: String,
    pub description: String,
    pub addr: NetworkAddress,
    pub weight: u32,
    pub conn_timeout: Option<TimeDuration>,
    pub read_timeout: Option<TimeDuration>,
    pub idle_timeout: Option<TimeDuration>,
    pub max_conns: u32,
    pub max_idle_conns: u32,
    /// Request domains this origin may serve; empty means all.
    pub domains: Vec<String>,
}

impl Default for Origin {
    fn default() -> Self {
        Self {
            id: 0,
            state: EntityState::Enabled,
            is_on: true,
            name: String::new(),
            description: String::new(),
            addr: NetworkAddress::default(),
            weight: 0,
            conn_timeout: None,
            read_timeout: None,
            idle_timeout: None,
            max_conns: 0,
            max_idle_conns: 0,
            domains: Vec::new(),
        }
    }
}

impl Entity for Origin {
    impl_entity!(EntityKind::Origin);
}
