//! Configuration composition subsystem.
//!
//! # Data Flow
//! ```text
//! Composer::compose(kind, id, &cache)
//!     → cache.rs (hit: deep copy / absent / placeholder)
//!     → store point read (missing or disabled → absent)
//!     → recurse into references with the same cache
//!     → cache.rs (store resolved tree)
//!     → configs.rs (self-contained tree for transport)
//! ```
//!
//! # Design Decisions
//! - Cache lifetime equals one top-level call
//! - Absent is a value (`None`), not an error
//! - Any decode failure aborts the whole tree

pub mod cache;
pub mod composer;
pub mod configs;

pub use cache::ComposeCache;
pub use composer::Composer;
pub use configs::{
    ClusterConfig, ComposedConfig, NodeConfig, OriginConfig, ReverseProxyConfig, ReverseProxySlots, ServerConfig,
    ServerGroupConfig,
};
