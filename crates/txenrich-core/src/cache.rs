//! Small owned caches with time-based expiry
//!
//! Entries expire `ttl` after insertion and can be invalidated explicitly.
//! Expired entries are swept opportunistically on insert.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Thread-safe key/value cache with a fixed TTL
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, if any
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|e| e.inserted_at.elapsed() < self.ttl)
            .map(|e| e.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let ttl = self.ttl;
        entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop one key; returns whether it was present
    pub fn invalidate(&self, key: &K) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Return the cached value or compute, store and return a new one
    ///
    /// Errors from `load` are passed through and nothing is cached.
    pub fn get_or_try_insert<E>(
        &self,
        key: K,
        load: impl FnOnce() -> std::result::Result<V, E>,
    ) -> std::result::Result<V, E> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = load()?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_after_insert() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn test_expired_entries_are_misses() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_invalidate() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("a", 1);
        assert!(cache.invalidate(&"a"));
        assert!(!cache.invalidate(&"a"));
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_get_or_try_insert_loads_once() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let mut calls = 0;
        let v: Result<i32, ()> = cache.get_or_try_insert("k", || {
            calls += 1;
            Ok(7)
        });
        assert_eq!(v, Ok(7));
        let v: Result<i32, ()> = cache.get_or_try_insert("k", || {
            calls += 1;
            Ok(8)
        });
        assert_eq!(v, Ok(7));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_load_error_not_cached() {
        let cache: TtlCache<&str, i32> = TtlCache::new(Duration::from_secs(60));
        let v = cache.get_or_try_insert("k", || Err("down"));
        assert_eq!(v, Err("down"));
        assert_eq!(cache.get(&"k"), None);
    }
}
