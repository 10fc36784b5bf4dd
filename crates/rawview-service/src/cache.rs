//! Bounded least-recently-used cache of encoded images.

use std::borrow::Borrow;
use std::hash::Hash;

use lru::LruCache;
use tracing::trace;

/// An LRU map with a fixed entry bound.
///
/// Inserting a new key when the cache already holds `capacity` entries
/// evicts least-recently-used entries first, so the steady state is exactly
/// `capacity` entries. [`get`](Self::get) counts as a use; [`contains`](Self::contains)
/// does not. Replacing the value of a key that is already present counts as a
/// use and never evicts anything.
pub struct LruImageCache<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
    capacity: usize,
}

impl<K: Hash + Eq, V: Clone> LruImageCache<K, V> {
    /// A `capacity` of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            capacity: capacity.max(1),
        }
    }

    /// Look up `key` and mark it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).cloned()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains(key)
    }

    pub fn put(&mut self, key: K, value: V) {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return;
        }
        while !self.entries.is_empty() && self.entries.len() >= self.capacity {
            if self.entries.pop_lru().is_some() {
                trace!(capacity = self.capacity, "Evicted least recently used entry");
            }
        }
        self.entries.put(key, value);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }
}
