//! Lookup-only table of weak references.
//!
//! The host and multipath tables do not own their entries; route resolution
//! does. A `WeakTable` records a non-owning handle per key and resolution
//! returns `None` once the owner has dropped the entry. Like the rest of the
//! table code it never creates entries on lookup.

use std::collections::btree_map::{self, BTreeMap};
use std::sync::{Arc, Weak};

/// Ordered map of keys to weak entry handles.
///
/// Iteration order is the key order, which keeps snapshots deterministic.
#[derive(Debug)]
pub struct WeakTable<K, V> {
    inner: BTreeMap<K, Weak<V>>,
}

impl<K: Ord, V> WeakTable<K, V> {
    /// Creates a new empty table.
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    /// Returns the number of registered keys, including expired ones.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if no keys are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns true if the key is registered, whether or not it still resolves.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Registers a non-owning handle to `entry` under `key`.
    ///
    /// Returns true if a previous registration was replaced.
    pub fn register(&mut self, key: K, entry: &Arc<V>) -> bool {
        self.inner.insert(key, Arc::downgrade(entry)).is_some()
    }

    /// Removes the registration for `key`.
    pub fn erase(&mut self, key: &K) -> bool {
        self.inner.remove(key).is_some()
    }

    /// Resolves the handle for `key`.
    ///
    /// Returns `None` if the key is unknown or its owner has gone away.
    /// **This never creates entries.**
    pub fn lookup(&self, key: &K) -> Option<Arc<V>> {
        self.inner.get(key).and_then(Weak::upgrade)
    }

    /// Iterates over registrations in key order without resolving them.
    pub fn iter(&self) -> btree_map::Iter<'_, K, Weak<V>> {
        self.inner.iter()
    }

    /// Iterates over the registrations that still resolve, in key order.
    pub fn resolved(&self) -> impl Iterator<Item = (&K, Arc<V>)> {
        self.inner
            .iter()
            .filter_map(|(key, weak)| weak.upgrade().map(|entry| (key, entry)))
    }

    /// Drops registrations whose owners have gone away.
    ///
    /// Returns the number of registrations removed.
    pub fn purge_expired(&mut self) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, weak| weak.strong_count() > 0);
        before - self.inner.len()
    }
}

impl<K: Ord, V> Default for WeakTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_does_not_create() {
        let table: WeakTable<u32, String> = WeakTable::new();
        assert!(table.lookup(&1).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_lookup_after_owner_dropped() {
        let mut table = WeakTable::new();
        let owner = Arc::new("entry".to_string());
        table.register(1u32, &owner);

        assert_eq!(table.lookup(&1).as_deref(), Some(&"entry".to_string()));

        drop(owner);
        assert!(table.lookup(&1).is_none());
        // The registration itself survives until purged.
        assert!(table.contains_key(&1));
        assert_eq!(table.purge_expired(), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_resolved_skips_expired_in_key_order() {
        let mut table = WeakTable::new();
        let a = Arc::new('a');
        let b = Arc::new('b');
        let c = Arc::new('c');
        table.register(3u32, &c);
        table.register(1u32, &a);
        table.register(2u32, &b);
        drop(b);

        let keys: Vec<u32> = table.resolved().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![1, 3]);
    }

    #[test]
    fn test_register_replaces() {
        let mut table = WeakTable::new();
        let first = Arc::new(1);
        let second = Arc::new(2);
        assert!(!table.register("k", &first));
        assert!(table.register("k", &second));
        assert_eq!(table.lookup(&"k").as_deref(), Some(&2));
        assert!(table.erase(&"k"));
        assert!(!table.erase(&"k"));
    }
}
