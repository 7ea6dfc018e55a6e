//! Process lifecycle.
//!
//! ```text
//! startup.rs:  seed store → composer → tracker → gateway / mutations / health
//! signals.rs:  SIGINT / SIGTERM → Shutdown::trigger
//! shutdown.rs: broadcast → sync + admin listeners drain, reload loop exits
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{bootstrap, Components};
