//! Bounded get-or-load caches.

use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// A bounded key-to-value cache with least-recently-used eviction.
///
/// `get_or_load` runs the loader outside the lock, so concurrent misses
/// on the same key may both invoke it. That is acceptable because
/// loaders are pure functions of their key; the last result wins.
pub(crate) struct Cache<K: Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq, V: Clone> Cache<K, V> {
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached value for `key`, loading and inserting it on a
    /// miss. A failed load caches nothing.
    pub fn get_or_load<E>(&self, key: K, load: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        if let Some(value) = self.inner.lock().get(&key) {
            return Ok(value.clone());
        }

        let value = load()?;
        self.inner.lock().put(key, value.clone());

        Ok(value)
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn load(counter: &AtomicUsize, value: u32) -> Result<u32, Infallible> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[test]
    fn loads_once_per_key() {
        let cache: Cache<u32, u32> = Cache::new(4);
        let loads = AtomicUsize::new(0);

        assert_eq!(cache.get_or_load(1, || load(&loads, 10)), Ok(10));
        assert_eq!(cache.get_or_load(1, || load(&loads, 99)), Ok(10));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn evicts_least_recently_used_first() {
        let cache: Cache<u32, u32> = Cache::new(3);
        let loads = AtomicUsize::new(0);

        for key in [1, 2, 3] {
            cache.get_or_load(key, || load(&loads, key * 10)).unwrap();
        }

        // Touch 1 so 2 becomes the least recently used entry.
        cache.get_or_load(1, || load(&loads, 0)).unwrap();
        cache.get_or_load(4, || load(&loads, 40)).unwrap();

        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert!(cache.contains(&3));
        assert!(cache.contains(&4));
    }

    #[test]
    fn failed_loads_cache_nothing() {
        let cache: Cache<u32, u32> = Cache::new(2);

        let result: Result<u32, &str> = cache.get_or_load(7, || Err("no"));
        assert_eq!(result, Err("no"));
        assert_eq!(cache.len(), 0);

        let loads = AtomicUsize::new(0);
        cache.get_or_load(7, || load(&loads, 70)).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache: Cache<u32, u32> = Cache::new(2);
        let loads = AtomicUsize::new(0);

        cache.get_or_load(1, || load(&loads, 1)).unwrap();
        cache.clear();

        assert_eq!(cache.len(), 0);
        cache.get_or_load(1, || load(&loads, 1)).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let cache: Cache<u32, u32> = Cache::new(0);
        let loads = AtomicUsize::new(0);

        cache.get_or_load(1, || load(&loads, 1)).unwrap();
        assert_eq!(cache.len(), 1);
    }
}
