//! Logs and metrics.
//!
//! `logging.rs` installs the `tracing` subscriber; HTTP spans carry the
//! request id. `metrics.rs` names every counter the core records. Recording
//! without an installed exporter is a no-op, so tests never need one.

pub mod logging;
pub mod metrics;
