//! Cluster health checking.
//!
//! # Data Flow
//! ```text
//! admin POST /admin/clusters/{id}/health-check/execute
//!     → executor.rs loads cluster policy (or config defaults)
//!     → enabled nodes of the cluster
//!     → parallel HTTP probes, one timeout each
//!     → NodeHealthResult per node
//! ```

pub mod executor;

pub use executor::{HealthCheckExecutor, NodeHealthResult};
