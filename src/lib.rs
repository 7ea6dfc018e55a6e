//! Edge control plane.
//!
//! Stores the authoritative configuration of a fleet of edge proxy/cache
//! nodes, composes fully resolved config trees for polling nodes, and tracks
//! which nodes need to refresh after a change.
//!
//! # Architecture Overview
//!
//! ```text
//!   admin ──PUT/POST──▶ admin::mutations ──write──▶ store ◀──reads── compose::composer
//!                              │                      ▲                    ▲
//!                              ▼                      │                    │
//!                      propagation::tracker ──mark────┘            sync::gateway
//!                                                                          ▲
//!   edge node ──GET pending / config, POST ack─────────────────────────────┘
//! ```

// Core
pub mod compose;
pub mod error;
pub mod model;
pub mod propagation;
pub mod store;
pub mod sync;

// Surfaces
pub mod admin;
pub mod http;

// Supporting services
pub mod health;
pub mod messaging;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use compose::{ComposeCache, ComposedConfig, Composer};
pub use config::ControlConfig;
pub use error::{EdgeError, EdgeResult};
pub use http::HttpServer;
pub use lifecycle::{Components, Shutdown};
pub use propagation::ChangeTracker;
pub use store::{EntityStore, MemoryStore};
pub use sync::SyncGateway;
