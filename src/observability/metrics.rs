//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_compose_total` (counter): compositions by kind, outcome
//! - `edge_compose_cache_hits_total` (counter): request-cache hits by kind
//! - `edge_compose_duration_seconds` (histogram): top-level composition latency
//! - `edge_propagation_nodes_marked_total` (counter): node versions bumped
//! - `edge_propagation_failures_total` (counter): failed node marks
//! - `edge_pending_nodes` (gauge): nodes with unacknowledged versions
//! - `edge_health_check_total` (counter): node probes by outcome
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::model::EntityKind;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

pub fn record_compose(kind: EntityKind, outcome: &'static str, started: Instant) {
    counter!("edge_compose_total", "kind" => kind.as_str(), "outcome" => outcome).increment(1);
    histogram!("edge_compose_duration_seconds", "kind" => kind.as_str()).record(started.elapsed().as_secs_f64());
}

pub fn record_cache_hit(kind: EntityKind) {
    counter!("edge_compose_cache_hits_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_nodes_marked(count: usize) {
    counter!("edge_propagation_nodes_marked_total").increment(count as u64);
}

pub fn record_propagation_failure() {
    counter!("edge_propagation_failures_total").increment(1);
}

pub fn set_pending_nodes(count: usize) {
    gauge!("edge_pending_nodes").set(count as f64);
}

pub fn record_health_check(is_ok: bool) {
    let outcome = if is_ok { "ok" } else { "failed" };
    counter!("edge_health_check_total", "outcome" => outcome).increment(1);
}
