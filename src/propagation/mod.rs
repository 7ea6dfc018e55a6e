//! Change-propagation subsystem.
//!
//! # Data Flow
//! ```text
//! admin mutation succeeds
//!     → tracker.rs notify_update(kind, id)
//!     → store edge index (child → enabled parents), breadth first
//!     → cluster → enabled nodes of the cluster
//!     → mark_node_pending (per-node version bump)
//!     → nodes discover the change via sync::gateway list_pending
//! ```
//!
//! # Design Decisions
//! - Per-node monotonically increasing versions instead of dirty flags
//! - A node reachable along several paths is marked once per call

pub mod tracker;

pub use tracker::{ChangeTracker, NotifyReport};
