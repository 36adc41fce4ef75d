//! Generic keyed flyweight storage.
//!
//! The registry owns the canonical instance for each key and hands out
//! `Arc` clones, so two lookups for one key are always `Arc::ptr_eq`.
//! Entries are never removed.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use super::observer::{CacheEvent, CacheObserver, TracingCacheObserver};

/// Thread-safe, append-only cache of shared values.
pub struct FlyweightRegistry<K, V> {
    entries: RwLock<HashMap<K, Arc<V>>>,
    observer: Arc<dyn CacheObserver>,
}

impl<K, V> fmt::Debug for FlyweightRegistry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.entries.read().unwrap_or_else(PoisonError::into_inner).len();
        f.debug_struct("FlyweightRegistry").field("len", &len).finish_non_exhaustive()
    }
}

impl<K, V> Default for FlyweightRegistry<K, V>
where
    K: Eq + Hash + fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FlyweightRegistry<K, V>
where
    K: Eq + Hash + fmt::Display,
{
    /// Create an empty registry that logs lookups through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_observer(Arc::new(TracingCacheObserver))
    }

    /// Create an empty registry reporting lookups to `observer`.
    #[must_use]
    pub fn with_observer(observer: Arc<dyn CacheObserver>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            observer,
        }
    }

    /// Return the shared value for `key`, creating it with `make` on a miss.
    ///
    /// `make` runs outside the lock. If another thread stores the same key
    /// first, the freshly built value is discarded and the stored instance is
    /// returned, so identity sharing holds under races.
    pub fn get_or_insert_with<F>(&self, key: K, make: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        if let Some(found) = self.read_entry(&key) {
            self.observer.on_event(&CacheEvent::Hit { key: key.to_string() });
            return found;
        }

        let label = key.to_string();
        let candidate = Arc::new(make());

        let (value, created) = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            match entries.get(&key) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    entries.insert(key, Arc::clone(&candidate));
                    (candidate, true)
                }
            }
        };

        let event = if created {
            CacheEvent::Miss { key: label }
        } else {
            CacheEvent::Hit { key: label }
        };
        self.observer.on_event(&event);
        value
    }

    /// Store `value` under `key` unless the key is present. Emits no event.
    ///
    /// Returns true if the value was inserted.
    pub fn preload(&self, key: K, value: V) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, Arc::new(value));
        true
    }

    /// Look up a cached value without creating one. Emits no event.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.read_entry(key)
    }

    /// Returns true if `key` is cached.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).contains_key(key)
    }

    /// Number of distinct cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the cached keys, in no particular order.
    #[must_use]
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn read_entry(&self, key: &K) -> Option<Arc<V>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(Arc::clone)
    }
}
