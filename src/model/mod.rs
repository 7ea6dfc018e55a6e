//! Stored entity model.
//!
//! # Data Flow
//! ```text
//! admin mutation
//!     → entities.rs (normalized record, references kept as JSON text)
//!     → store (persisted, edge index rebuilt from declared_edges)
//!     → compose (references decoded and resolved into config trees)
//! ```
//!
//! # Design Decisions
//! - References stay serialized in the record; decoding happens at read time
//! - Removal is a state change, never a hard delete
//! - Reference shapes use camelCase, matching what nodes receive

pub mod entities;
pub mod kind;
pub mod refs;
pub mod shared;

pub use entities::{Cluster, Edge, Entity, Node, Origin, ReverseProxy, Server, ServerGroup, ServerType};
pub use kind::{EntityKind, EntityRef, EntityState};
pub use refs::{OriginRef, ProxyProtocol, RawRef, ReverseProxyRef};
pub use shared::{HealthCheckPolicy, NetworkAddress, SchedulingConfig, TimeDuration, TimeUnit};
