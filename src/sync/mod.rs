//! Node sync gateway.
//!
//! # Data Flow
//! ```text
//! edge node poll
//!     → list_pending(scope)      (store node versions)
//!     → fetch / fetch_node       (fresh ComposeCache per call)
//!     → apply locally
//!     → ack(version)             (store ack_node_version, via HTTP)
//! ```

pub mod gateway;

pub use gateway::{NodeSnapshot, PendingScope, SyncGateway};
