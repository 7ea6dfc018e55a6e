//! Operator messages raised by the control plane.
//!
//! # Data Flow
//! ```text
//! node reports firewall event
//!     → firewall.rs resolves cluster, node and server names
//!     → renders the message body
//!     → MessageSink::create_message_task
//!     → admin lists tasks via /admin/messages
//! ```

pub mod firewall;
pub mod sink;

pub use firewall::{FirewallNotifier, HttpFirewallEvent};
pub use sink::{MemoryMessageSink, MessageSink, MessageTask, MessageTaskTarget, MessageType};
