//! Composed configuration trees shipped to edge nodes.
//!
//! Every type here is self-contained: references are resolved into nested
//! configs and nothing points back into the store.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::model::{
    EntityKind, HealthCheckPolicy, NetworkAddress, OriginRef, ProxyProtocol, ReverseProxyRef, SchedulingConfig,
    ServerType, TimeDuration,
};

/// Fully resolved origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginConfig {
    pub id: i64,
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
    pub domains: Vec<String>,
}

/// Reverse proxy with its origins resolved in reference order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseProxyConfig {
    pub id: i64,
    pub is_on: bool,
    pub scheduling: Option<SchedulingConfig>,
    pub primary_origin_refs: Vec<OriginRef>,
    pub backup_origin_refs: Vec<OriginRef>,
    pub primary_origins: Vec<OriginConfig>,
    pub backup_origins: Vec<OriginConfig>,
    pub request_host: String,
    pub strip_prefix: String,
}

/// The HTTP/TCP/UDP reverse-proxy references of a server or group, each with
/// its resolved config. A reference may be present while its config is
/// absent when the target is disabled or gone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseProxySlots {
    pub http_reverse_proxy_ref: Option<ReverseProxyRef>,
    pub http_reverse_proxy: Option<ReverseProxyConfig>,
    pub tcp_reverse_proxy_ref: Option<ReverseProxyRef>,
    pub tcp_reverse_proxy: Option<ReverseProxyConfig>,
    pub udp_reverse_proxy_ref: Option<ReverseProxyRef>,
    pub udp_reverse_proxy: Option<ReverseProxyConfig>,
}

impl ReverseProxySlots {
    pub fn set(&mut self, protocol: ProxyProtocol, reference: ReverseProxyRef, config: Option<ReverseProxyConfig>) {
        let (r, c) = match protocol {
            ProxyProtocol::Http => (&mut self.http_reverse_proxy_ref, &mut self.http_reverse_proxy),
            ProxyProtocol::Tcp => (&mut self.tcp_reverse_proxy_ref, &mut self.tcp_reverse_proxy),
            ProxyProtocol::Udp => (&mut self.udp_reverse_proxy_ref, &mut self.udp_reverse_proxy),
        };
        *r = Some(reference);
        *c = config;
    }

    pub fn reference(&self, protocol: ProxyProtocol) -> Option<&ReverseProxyRef> {
        match protocol {
            ProxyProtocol::Http => self.http_reverse_proxy_ref.as_ref(),
            ProxyProtocol::Tcp => self.tcp_reverse_proxy_ref.as_ref(),
            ProxyProtocol::Udp => self.udp_reverse_proxy_ref.as_ref(),
        }
    }

    pub fn config(&self, protocol: ProxyProtocol) -> Option<&ReverseProxyConfig> {
        match protocol {
            ProxyProtocol::Http => self.http_reverse_proxy.as_ref(),
            ProxyProtocol::Tcp => self.tcp_reverse_proxy.as_ref(),
            ProxyProtocol::Udp => self.udp_reverse_proxy.as_ref(),
        }
    }

    pub fn config_mut(&mut self, protocol: ProxyProtocol) -> Option<&mut ReverseProxyConfig> {
        match protocol {
            ProxyProtocol::Http => self.http_reverse_proxy.as_mut(),
            ProxyProtocol::Tcp => self.tcp_reverse_proxy.as_mut(),
            ProxyProtocol::Udp => self.udp_reverse_proxy.as_mut(),
        }
    }
}

/// Server group with its reverse proxies resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerGroupConfig {
    pub id: i64,
    pub name: String,
    pub is_on: bool,
    pub order: i32,
    #[serde(flatten)]
    pub proxies: ReverseProxySlots,
}

/// Server with its own proxies and every enabled group resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub id: i64,
    pub cluster_id: i64,
    pub name: String,
    pub is_on: bool,
    pub server_type: ServerType,
    #[serde(flatten)]
    pub proxies: ReverseProxySlots,
    pub groups: Vec<ServerGroupConfig>,
}

/// Cluster-wide settings a node needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub id: i64,
    pub name: String,
    pub install_dir: String,
    pub use_all_api_nodes: bool,
    pub api_node_ids: Vec<i64>,
    pub health_check: Option<HealthCheckPolicy>,
}

/// Everything one edge node runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub id: i64,
    pub name: String,
    pub is_on: bool,
    pub cluster_id: i64,
    pub access_addrs: Vec<String>,
    pub cluster: Option<ClusterConfig>,
    pub servers: Vec<ServerConfig>,
}

/// A composed config of any kind, tagged for transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "config", rename_all = "snake_case")]
pub enum ComposedConfig {
    Cluster(ClusterConfig),
    Node(NodeConfig),
    Server(ServerConfig),
    ServerGroup(ServerGroupConfig),
    ReverseProxy(ReverseProxyConfig),
    Origin(OriginConfig),
}

impl ComposedConfig {
    pub fn kind(&self) -> EntityKind {
        match self {
            ComposedConfig::Cluster(_) => EntityKind::Cluster,
            ComposedConfig::Node(_) => EntityKind::Node,
            ComposedConfig::Server(_) => EntityKind::Server,
            ComposedConfig::ServerGroup(_) => EntityKind::ServerGroup,
            ComposedConfig::ReverseProxy(_) => EntityKind::ReverseProxy,
            ComposedConfig::Origin(_) => EntityKind::Origin,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            ComposedConfig::Cluster(c) => c.id,
            ComposedConfig::Node(c) => c.id,
            ComposedConfig::Server(c) => c.id,
            ComposedConfig::ServerGroup(c) => c.id,
            ComposedConfig::ReverseProxy(c) => c.id,
            ComposedConfig::Origin(c) => c.id,
        }
    }
}

/// A config type the composer produces and the cache can hold.
pub trait Composed: Serialize + DeserializeOwned + Clone + Send + Sync + Into<ComposedConfig> {
    const KIND: EntityKind;

    fn from_composed(config: ComposedConfig) -> Option<Self>;
}

macro_rules! impl_composed {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for ComposedConfig {
            fn from(config: $ty) -> Self {
                ComposedConfig::$variant(config)
            }
        }

        impl Composed for $ty {
            const KIND: EntityKind = EntityKind::$variant;

            fn from_composed(config: ComposedConfig) -> Option<Self> {
                match config {
                    ComposedConfig::$variant(c) => Some(c),
                    _ => None,
                }
            }
        }
    };
}

impl_composed!(ClusterConfig, Cluster);
impl_composed!(NodeConfig, Node);
impl_composed!(ServerConfig, Server);
impl_composed!(ServerGroupConfig, ServerGroup);
impl_composed!(ReverseProxyConfig, ReverseProxy);
impl_composed!(OriginConfig, Origin);
