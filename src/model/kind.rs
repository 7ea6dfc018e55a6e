//! Entity kinds, states and typed entity references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of entity kinds the control plane stores and composes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Cluster,
    Node,
    Server,
    ServerGroup,
    ReverseProxy,
    Origin,
}

impl EntityKind {
    /// Stable lowercase name used in cache keys, URLs and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Cluster => "cluster",
            EntityKind::Node => "node",
            EntityKind::Server => "server",
            EntityKind::ServerGroup => "server_group",
            EntityKind::ReverseProxy => "reverse_proxy",
            EntityKind::Origin => "origin",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown entity kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownKind {}

impl FromStr for EntityKind {
    type Err = UnknownKind;

    /// Accepts the canonical snake_case names plus the plural/kebab forms used
    /// by the admin routes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cluster" | "clusters" => Ok(EntityKind::Cluster),
            "node" | "nodes" => Ok(EntityKind::Node),
            "server" | "servers" => Ok(EntityKind::Server),
            "server_group" | "group" | "groups" => Ok(EntityKind::ServerGroup),
            "reverse_proxy" | "reverse-proxy" | "reverse-proxies" => Ok(EntityKind::ReverseProxy),
            "origin" | "origins" => Ok(EntityKind::Origin),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// Lifecycle state of a stored record.
///
/// `Disabled` is how an entity is removed: it stays in the store but is
/// invisible to composition and propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    #[default]
    Enabled,
    Disabled,
}

impl EntityState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, EntityState::Enabled)
    }
}

/// A `(kind, id)` pair identifying one stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
