//! Request-scoped composition cache.
//!
//! # Responsibilities
//! - Remember what one top-level composition already resolved
//! - Hand out independent copies on every hit
//! - Break reference cycles with a placeholder written before recursion
//!
//! # Design Decisions
//! - One cache per top-level call; never shared between requests
//! - Hits are cloned through a JSON round trip, the same path configs take
//!   to reach a node, so nothing a caller mutates can leak back
//! - The lock is never held across an await point

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::compose::configs::{Composed, ComposedConfig};
use crate::error::{EdgeError, EdgeResult};
use crate::model::EntityRef;
use crate::observability::metrics;

enum Slot {
    /// Composition of this key is in progress further up the stack.
    Resolving,
    Absent,
    Ready(ComposedConfig),
}

/// Outcome of a cache lookup.
#[derive(Debug)]
pub enum Lookup<T> {
    Miss,
    Absent,
    Hit(T),
}

/// Per-call map from `(kind, id)` to composed config.
#[derive(Default)]
pub struct ComposeCache {
    slots: Mutex<HashMap<EntityRef, Slot>>,
    hits: AtomicUsize,
}

impl ComposeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `(T::KIND, id)`, returning a deep copy on hit.
    pub fn lookup<T: Composed>(&self, id: i64) -> EdgeResult<Lookup<T>> {
        let key = EntityRef::new(T::KIND, id);
        let encoded = {
            let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            match slots.get(&key) {
                None => return Ok(Lookup::Miss),
                Some(Slot::Absent) => return Ok(Lookup::Absent),
                Some(Slot::Resolving) => {
                    tracing::warn!(entity = %key, "Reference cycle detected, resolving to absent");
                    return Ok(Lookup::Absent);
                }
                Some(Slot::Ready(config)) => serde_json::to_vec(config).map_err(|e| clone_error(key, e))?,
            }
        };

        let cloned: ComposedConfig = serde_json::from_slice(&encoded).map_err(|e| clone_error(key, e))?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_hit(T::KIND);

        Ok(match T::from_composed(cloned) {
            Some(config) => Lookup::Hit(config),
            None => Lookup::Miss,
        })
    }

    /// Mark `(T::KIND, id)` as being resolved.
    pub fn begin<T: Composed>(&self, id: i64) {
        self.put(EntityRef::new(T::KIND, id), Slot::Resolving);
    }

    /// Record a fully resolved config.
    pub fn store<T: Composed>(&self, id: i64, config: &T) {
        self.put(EntityRef::new(T::KIND, id), Slot::Ready(config.clone().into()));
    }

    /// Record that the entity is missing or disabled.
    pub fn store_absent<T: Composed>(&self, id: i64) {
        self.put(EntityRef::new(T::KIND, id), Slot::Absent);
    }

    /// Drop the placeholder of a composition that failed.
    pub fn abandon<T: Composed>(&self, id: i64) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.remove(&EntityRef::new(T::KIND, id));
    }

    /// Number of keys recorded, including absent ones.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hits served since creation.
    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    fn put(&self, key: EntityRef, slot: Slot) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.insert(key, slot);
    }
}

fn clone_error(key: EntityRef, source: serde_json::Error) -> EdgeError {
    EdgeError::Decode {
        kind: key.kind,
        id: key.id,
        field: "cached config",
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::configs::OriginConfig;
    use crate::model::NetworkAddress;

    fn origin(id: i64, weight: u32) -> OriginConfig {
        OriginConfig {
            id,
            is_on: true,
            name: format!("origin-{}", id),
            description: String::new(),
            addr: NetworkAddress {
                protocol: "http".into(),
                host: "10.0.0.1".into(),
                port_range: "80".into(),
            },
            weight,
            conn_timeout: None,
            read_timeout: None,
            idle_timeout: None,
            max_conns: 0,
            max_idle_conns: 0,
            domains: vec!["example.com".into()],
        }
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = ComposeCache::new();
        assert!(matches!(cache.lookup::<OriginConfig>(1).unwrap(), Lookup::Miss));

        cache.store(1, &origin(1, 10));
        match cache.lookup::<OriginConfig>(1).unwrap() {
            Lookup::Hit(config) => assert_eq!(config, origin(1, 10)),
            other => panic!("expected hit, got {:?}", other),
        }
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn test_hits_are_independent_copies() {
        let cache = ComposeCache::new();
        cache.store(1, &origin(1, 10));

        let mut first = match cache.lookup::<OriginConfig>(1).unwrap() {
            Lookup::Hit(c) => c,
            other => panic!("expected hit, got {:?}", other),
        };
        first.weight = 99;
        first.domains.push("mutated.example".into());

        match cache.lookup::<OriginConfig>(1).unwrap() {
            Lookup::Hit(second) => {
                assert_eq!(second.weight, 10);
                assert_eq!(second.domains, vec!["example.com".to_string()]);
            }
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[test]
    fn test_resolving_placeholder_reads_as_absent() {
        let cache = ComposeCache::new();
        cache.begin::<OriginConfig>(4);
        assert!(matches!(cache.lookup::<OriginConfig>(4).unwrap(), Lookup::Absent));

        cache.abandon::<OriginConfig>(4);
        assert!(matches!(cache.lookup::<OriginConfig>(4).unwrap(), Lookup::Miss));
    }

    #[test]
    fn test_absent_is_remembered() {
        let cache = ComposeCache::new();
        cache.store_absent::<OriginConfig>(2);
        assert!(matches!(cache.lookup::<OriginConfig>(2).unwrap(), Lookup::Absent));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hit_count(), 0);
    }
}
