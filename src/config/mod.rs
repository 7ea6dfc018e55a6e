//! Control plane configuration.
//!
//! # Data Flow
//! ```text
//! control.toml
//!     → loader.rs (TOML → ControlConfig)
//!     → validation.rs (every problem collected, not just the first)
//!     → ArcSwap<ControlConfig> shared with the HTTP layer
//!
//! file change → watcher.rs → loader.rs → swap
//! ```
//!
//! # Design Decisions
//! - Every section has defaults, so an empty file is a valid config
//! - Listener addresses are bound once; a reload changes keys and timeouts only
//! - A rejected reload leaves the running config untouched

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::ControlConfig;
