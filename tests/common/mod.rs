//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use edge_control::config::ControlConfig;
use edge_control::lifecycle::{Components, Shutdown};
use edge_control::messaging::{MemoryMessageSink, MessageSink};
use edge_control::model::{
    Cluster, EntityKind, EntityRef, EntityState, Node, Origin, OriginRef, RawRef, ReverseProxy, ReverseProxyRef,
    Server, ServerGroup,
};
use edge_control::store::{EntityStore, MemoryStore, NodeVersion, StoreError, StoreResult};
use edge_control::HttpServer;

pub const CLUSTER: i64 = 1;
pub const NODES: [i64; 3] = [10, 11, 12];
pub const SERVER: i64 = 20;
pub const GROUP_HTTP: i64 = 3;
pub const GROUP_TCP: i64 = 4;
pub const PROXY_HTTP: i64 = 7;
pub const PROXY_TCP: i64 = 8;
pub const ORIGIN: i64 = 1;

/// One cluster with three nodes and one server using two groups whose
/// proxies share origin 1:
///
/// ```text
/// origin 1 ─┬─ proxy 7 (http) ── group 3 ─┬─ server 20 ── cluster 1 ── nodes 10, 11, 12
///           └─ proxy 8 (tcp)  ── group 4 ─┘
/// ```
pub async fn seed_fleet(store: &MemoryStore) {
    store
        .save_cluster(Cluster {
            id: CLUSTER,
            name: "edge-eu".into(),
            api_nodes: RawRef::new("[1]"),
            ..Default::default()
        })
        .await
        .unwrap();
    for (i, id) in NODES.into_iter().enumerate() {
        store
            .save_node(Node {
                id,
                cluster_id: CLUSTER,
                name: format!("node-{}", i + 1),
                access_addrs: RawRef::new(r#"["127.0.0.1"]"#),
                ..Default::default()
            })
            .await
            .unwrap();
    }
    store
        .save_origin(Origin {
            id: ORIGIN,
            name: "primary".into(),
            weight: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    for id in [PROXY_HTTP, PROXY_TCP] {
        store
            .save_reverse_proxy(ReverseProxy {
                id,
                primary_origins: RawRef::encode(&vec![OriginRef::new(ORIGIN)]).unwrap(),
                ..Default::default()
            })
            .await
            .unwrap();
    }
    store
        .save_server_group(ServerGroup {
            id: GROUP_HTTP,
            name: "g1".into(),
            http_reverse_proxy: RawRef::encode(&ReverseProxyRef::new(PROXY_HTTP)).unwrap(),
            ..Default::default()
        })
        .await
        .unwrap();
    store
        .save_server_group(ServerGroup {
            id: GROUP_TCP,
            name: "g2".into(),
            tcp_reverse_proxy: RawRef::encode(&ReverseProxyRef::new(PROXY_TCP)).unwrap(),
            ..Default::default()
        })
        .await
        .unwrap();
    store
        .save_server(Server {
            id: SERVER,
            cluster_id: CLUSTER,
            name: "shop".into(),
            group_ids: RawRef::encode(&vec![GROUP_HTTP, GROUP_TCP]).unwrap(),
            ..Default::default()
        })
        .await
        .unwrap();
}

pub async fn fleet_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    seed_fleet(&store).await;
    store
}

/// Store wrapper counting point reads per kind.
pub struct CountingStore {
    inner: MemoryStore,
    reads: Mutex<HashMap<EntityKind, usize>>,
}

impl CountingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            reads: Mutex::new(HashMap::new()),
        }
    }

    pub fn reads(&self, kind: EntityKind) -> usize {
        self.reads.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    fn count(&self, kind: EntityKind) {
        *self.reads.lock().unwrap().entry(kind).or_insert(0) += 1;
    }
}

/// Store wrapper that fails chosen node marks, or every read.
pub struct FailingStore {
    inner: MemoryStore,
    fail_marks: Mutex<HashSet<i64>>,
    unavailable: Mutex<bool>,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_marks: Mutex::new(HashSet::new()),
            unavailable: Mutex::new(false),
        }
    }

    pub fn fail_mark_for(&self, node_id: i64) {
        self.fail_marks.lock().unwrap().insert(node_id);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    fn check(&self) -> StoreResult<()> {
        if *self.unavailable.lock().unwrap() {
            return Err(StoreError::Unavailable("injected outage".into()));
        }
        Ok(())
    }
}

/// Implements `EntityStore` by delegating to `self.inner`, running
/// a hook before every point read and every node mark.
macro_rules! delegate_store {
    ($ty:ty, |$this:ident, $kind:ident| $hook:expr, |$mark_this:ident, $node:ident| $mark_hook:expr) => {
        #[async_trait]
        impl EntityStore for $ty {
            async fn find_cluster(&self, id: i64) -> StoreResult<Option<Cluster>> {
                let ($this, $kind) = (self, EntityKind::Cluster);
                let () = $hook?;
                self.inner.find_cluster(id).await
            }
            async fn find_node(&self, id: i64) -> StoreResult<Option<Node>> {
                let ($this, $kind) = (self, EntityKind::Node);
                let () = $hook?;
                self.inner.find_node(id).await
            }
            async fn find_server(&self, id: i64) -> StoreResult<Option<Server>> {
                let ($this, $kind) = (self, EntityKind::Server);
                let () = $hook?;
                self.inner.find_server(id).await
            }
            async fn find_server_group(&self, id: i64) -> StoreResult<Option<ServerGroup>> {
                let ($this, $kind) = (self, EntityKind::ServerGroup);
                let () = $hook?;
                self.inner.find_server_group(id).await
            }
            async fn find_reverse_proxy(&self, id: i64) -> StoreResult<Option<ReverseProxy>> {
                let ($this, $kind) = (self, EntityKind::ReverseProxy);
                let () = $hook?;
                self.inner.find_reverse_proxy(id).await
            }
            async fn find_origin(&self, id: i64) -> StoreResult<Option<Origin>> {
                let ($this, $kind) = (self, EntityKind::Origin);
                let () = $hook?;
                self.inner.find_origin(id).await
            }
            async fn find_enabled_node_ids_with_cluster(&self, cluster_id: i64) -> StoreResult<Vec<i64>> {
                self.inner.find_enabled_node_ids_with_cluster(cluster_id).await
            }
            async fn find_enabled_server_ids_with_cluster(&self, cluster_id: i64) -> StoreResult<Vec<i64>> {
                self.inner.find_enabled_server_ids_with_cluster(cluster_id).await
            }
            async fn find_parents(&self, child: EntityRef) -> StoreResult<Vec<EntityRef>> {
                self.inner.find_parents(child).await
            }
            async fn save_cluster(&self, cluster: Cluster) -> StoreResult<i64> {
                self.inner.save_cluster(cluster).await
            }
            async fn save_node(&self, node: Node) -> StoreResult<i64> {
                self.inner.save_node(node).await
            }
            async fn save_server(&self, server: Server) -> StoreResult<i64> {
                self.inner.save_server(server).await
            }
            async fn save_server_group(&self, group: ServerGroup) -> StoreResult<i64> {
                self.inner.save_server_group(group).await
            }
            async fn save_reverse_proxy(&self, reverse_proxy: ReverseProxy) -> StoreResult<i64> {
                self.inner.save_reverse_proxy(reverse_proxy).await
            }
            async fn save_origin(&self, origin: Origin) -> StoreResult<i64> {
                self.inner.save_origin(origin).await
            }
            async fn update_state(&self, target: EntityRef, state: EntityState) -> StoreResult<bool> {
                self.inner.update_state(target, state).await
            }
            async fn mark_node_pending(&self, node_id: i64) -> StoreResult<u64> {
                let ($mark_this, $node) = (self, node_id);
                let () = $mark_hook?;
                self.inner.mark_node_pending(node_id).await
            }
            async fn ack_node_version(&self, node_id: i64, version: u64) -> StoreResult<NodeVersion> {
                self.inner.ack_node_version(node_id, version).await
            }
            async fn find_node_version(&self, node_id: i64) -> StoreResult<NodeVersion> {
                self.inner.find_node_version(node_id).await
            }
            async fn find_pending_node_ids(&self) -> StoreResult<Vec<i64>> {
                self.inner.find_pending_node_ids().await
            }
        }
    };
}

delegate_store!(
    CountingStore,
    |this, kind| {
        this.count(kind);
        StoreResult::Ok(())
    },
    |_this, _node| StoreResult::Ok(())
);

delegate_store!(
    FailingStore,
    |this, _kind| this.check(),
    |this, node| {
        if this.fail_marks.lock().unwrap().contains(&node) {
            Err(StoreError::Query(format!("injected failure marking node {}", node)))
        } else {
            StoreResult::Ok(())
        }
    }
);

pub fn test_config() -> ControlConfig {
    let mut config = ControlConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.admin.enabled = true;
    config.admin.api_key = "test-admin-key".into();
    config.admin.bind_address = "127.0.0.1:0".into();
    config.observability.metrics_enabled = false;
    config.health_check.timeout_secs = 2;
    config
}

/// A running control plane bound to ephemeral ports.
pub struct TestServer {
    pub sync_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub components: Components,
    pub messages: Arc<MemoryMessageSink>,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn sync_url(&self, path: &str) -> String {
        format!("http://{}{}", self.sync_addr, path)
    }

    pub fn admin_url(&self, path: &str) -> String {
        format!("http://{}{}", self.admin_addr, path)
    }
}

/// Start both listeners around `store`.
pub async fn start_server(store: Arc<dyn EntityStore>, config: ControlConfig) -> TestServer {
    let messages = Arc::new(MemoryMessageSink::new());
    let sink: Arc<dyn MessageSink> = messages.clone();
    let components = Components::new(store, sink, &config);

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let admin_listener = TcpListener::bind(&config.admin.bind_address).await.unwrap();
    let sync_addr = listener.local_addr().unwrap();
    let admin_addr = admin_listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(Arc::new(ArcSwap::from_pointee(config)), components.clone());
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, Some(admin_listener), &server_shutdown).await;
    });

    TestServer {
        sync_addr,
        admin_addr,
        components,
        messages,
        shutdown,
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Start a programmable mock HTTP backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;

                let (status, body) = f().await;
                let status_text = match status {
                    200 => "200 OK",
                    404 => "404 Not Found",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}
