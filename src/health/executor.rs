//! On-demand cluster health check.
//!
//! # Responsibilities
//! - Resolve the cluster's probe policy, falling back to configured defaults
//! - Probe every enabled node of the cluster in parallel
//! - Report success, error and latency per node
//!
//! # Design Decisions
//! - One-shot, triggered by an admin; no background loop and no state kept
//! - Each probe carries its own timeout; a slow node never delays the report
//!   beyond that timeout

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use futures_util::stream::{self, StreamExt};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use tokio::time;
use url::Url;

use crate::config::schema::HealthCheckConfig;
use crate::error::{require_id, EdgeError, EdgeResult};
use crate::model::{EntityKind, HealthCheckPolicy, Node};
use crate::observability::metrics;
use crate::store::EntityStore;

/// Probe result for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeHealthResult {
    pub node_id: i64,
    pub node_name: String,
    pub node_addr: String,
    pub is_ok: bool,
    pub error: String,
    pub cost_ms: f64,
}

/// Effective probe settings for one run.
#[derive(Debug, Clone)]
struct Probe {
    port: u16,
    path: String,
    timeout: Duration,
}

/// Runs cluster health checks against edge nodes.
#[derive(Clone)]
pub struct HealthCheckExecutor {
    store: Arc<dyn EntityStore>,
    defaults: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthCheckExecutor {
    pub fn new(store: Arc<dyn EntityStore>, defaults: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            store,
            defaults,
            client,
        }
    }

    /// Probe every enabled node of `cluster_id`. Results are ordered by node id.
    pub async fn run(&self, cluster_id: i64) -> EdgeResult<Vec<NodeHealthResult>> {
        require_id("cluster_id", cluster_id)?;
        let cluster = self
            .store
            .find_cluster(cluster_id)
            .await?
            .ok_or(EdgeError::NotFound {
                kind: EntityKind::Cluster,
                id: cluster_id,
            })?;

        let policy: Option<HealthCheckPolicy> = cluster.health_check.decode().map_err(|source| EdgeError::Decode {
            kind: EntityKind::Cluster,
            id: cluster_id,
            field: "health_check",
            source,
        })?;
        let probe = self.resolve_probe(policy.as_ref());

        let mut nodes = Vec::new();
        for node_id in self.store.find_enabled_node_ids_with_cluster(cluster_id).await? {
            if let Some(node) = self.store.find_node(node_id).await? {
                nodes.push(node);
            }
        }

        tracing::info!(
            cluster_id,
            nodes = nodes.len(),
            port = probe.port,
            path = %probe.path,
            "Executing cluster health check"
        );

        let concurrency = nodes.len().max(1);
        let mut results: Vec<NodeHealthResult> = stream::iter(nodes)
            .map(|node| self.check_node(node, &probe))
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.sort_by_key(|r| r.node_id);

        Ok(results)
    }

    fn resolve_probe(&self, policy: Option<&HealthCheckPolicy>) -> Probe {
        let mut probe = Probe {
            port: self.defaults.port,
            path: self.defaults.path.clone(),
            timeout: Duration::from_secs(self.defaults.timeout_secs),
        };
        if let Some(policy) = policy {
            if policy.port > 0 {
                probe.port = policy.port;
            }
            if !policy.url_path.is_empty() {
                probe.path = policy.url_path.clone();
            }
            if let Some(timeout) = policy.timeout.as_ref().map(|t| t.to_duration()) {
                if !timeout.is_zero() {
                    probe.timeout = timeout;
                }
            }
        }
        probe
    }

    async fn check_node(&self, node: Node, probe: &Probe) -> NodeHealthResult {
        let mut result = NodeHealthResult {
            node_id: node.id,
            node_name: node.name.clone(),
            node_addr: String::new(),
            is_ok: false,
            error: String::new(),
            cost_ms: 0.0,
        };

        let addrs: Vec<String> = match node.access_addrs.decode() {
            Ok(addrs) => addrs.unwrap_or_default(),
            Err(e) => {
                result.error = format!("invalid access addresses: {}", e);
                metrics::record_health_check(false);
                return result;
            }
        };
        let Some(addr) = addrs.into_iter().find(|a| !a.trim().is_empty()) else {
            result.error = "node has no access address".to_string();
            metrics::record_health_check(false);
            return result;
        };
        result.node_addr = addr;

        let started = Instant::now();
        match self.probe(&result.node_addr, probe).await {
            Ok(()) => result.is_ok = true,
            Err(e) => {
                tracing::warn!(node_id = node.id, addr = %result.node_addr, error = %e, "Node health check failed");
                result.error = e;
            }
        }
        result.cost_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics::record_health_check(result.is_ok);
        result
    }

    async fn probe(&self, addr: &str, probe: &Probe) -> Result<(), String> {
        let (host, port) = split_host_port(addr)?;
        let port = port.unwrap_or(probe.port);
        let host = if host.contains(':') {
            format!("[{}]", host)
        } else {
            host.to_string()
        };
        let url = Url::parse(&format!("http://{}:{}", host, port))
            .and_then(|base| base.join(&probe.path))
            .map_err(|e| format!("invalid probe url for '{}': {}", addr, e))?;
        let request = Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header("user-agent", "edge-control-health-check")
            .body(Body::empty())
            .map_err(|e| format!("invalid probe url '{}': {}", url, e))?;

        match time::timeout(probe.timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => Err(format!("unexpected status {}", response.status())),
            Ok(Err(e)) => Err(format!("connection error: {}", e)),
            Err(_) => Err(format!("timed out after {}ms", probe.timeout.as_millis())),
        }
    }
}

/// Split a `host[:port]` access address. IPv6 hosts may be bracketed
/// (`[::1]:8080`); an unbracketed IPv6 address carries no port.
fn split_host_port(addr: &str) -> Result<(&str, Option<u16>), String> {
    let addr = addr.trim();
    let parse_port = |port: &str| {
        port.parse::<u16>()
            .map_err(|_| format!("invalid port '{}' in access address '{}'", port, addr))
    };

    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| format!("unterminated IPv6 address '{}'", addr))?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host, Some(parse_port(port)?))),
            None if tail.is_empty() => Ok((host, None)),
            None => Err(format!("unexpected '{}' after IPv6 address '{}'", tail, addr)),
        };
    }

    match addr.split_once(':') {
        Some((host, port)) if !port.contains(':') => Ok((host, Some(parse_port(port)?))),
        _ => Ok((addr, None)),
    }
}
