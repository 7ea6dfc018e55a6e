//! Child → parent edge index.
//!
//! # Responsibilities
//! - Answer "who references this entity" without scanning stored JSON
//! - Replace an entity's edges atomically when it is saved again
//!
//! # Design Decisions
//! - Edges are keyed by the record that declared them, so a re-save drops
//!   stale edges before adding new ones
//! - Enabled-state filtering is left to the store, which owns the records

use std::collections::{BTreeSet, HashMap};

use crate::model::{Edge, EntityRef};

/// Bidirectional bookkeeping of ownership edges.
#[derive(Debug, Default)]
pub struct EdgeIndex {
    /// child -> parents
    parents: HashMap<EntityRef, BTreeSet<EntityRef>>,
    /// declaring record -> the edges it declared
    declared: HashMap<EntityRef, Vec<Edge>>,
}

impl EdgeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every edge previously declared by `owner` with `edges`.
    pub fn replace(&mut self, owner: EntityRef, edges: Vec<Edge>) {
        if let Some(old) = self.declared.remove(&owner) {
            for edge in old {
                if let Some(set) = self.parents.get_mut(&edge.child) {
                    set.remove(&edge.parent);
                    if set.is_empty() {
                        self.parents.remove(&edge.child);
                    }
                }
            }
        }

        for edge in &edges {
            self.parents.entry(edge.child).or_default().insert(edge.parent);
        }
        if !edges.is_empty() {
            self.declared.insert(owner, edges);
        }
    }

    /// All parents of `child`, in a stable order.
    pub fn parents_of(&self, child: EntityRef) -> Vec<EntityRef> {
        self.parents
            .get(&child)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn edge_count(&self) -> usize {
        self.parents.values().map(BTreeSet::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    fn group(id: i64) -> EntityRef {
        EntityRef::new(EntityKind::ServerGroup, id)
    }

    fn proxy(id: i64) -> EntityRef {
        EntityRef::new(EntityKind::ReverseProxy, id)
    }

    #[test]
    fn test_replace_drops_stale_edges() {
        let mut index = EdgeIndex::new();
        index.replace(group(1), vec![Edge { child: proxy(7), parent: group(1) }]);
        index.replace(group(2), vec![Edge { child: proxy(7), parent: group(2) }]);
        assert_eq!(index.parents_of(proxy(7)), vec![group(1), group(2)]);

        // group 1 now points at proxy 8
        index.replace(group(1), vec![Edge { child: proxy(8), parent: group(1) }]);
        assert_eq!(index.parents_of(proxy(7)), vec![group(2)]);
        assert_eq!(index.parents_of(proxy(8)), vec![group(1)]);
        assert_eq!(index.edge_count(), 2);

        index.replace(group(2), Vec::new());
        assert!(index.parents_of(proxy(7)).is_empty());
    }
}
