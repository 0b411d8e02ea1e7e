//! Thread-safe map with snapshot reads
//!
//! Every operation takes the lock for exactly its own duration. Reads hand
//! back clones, so callers never hold the lock while iterating.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Mutex-guarded HashMap
#[derive(Debug)]
pub struct SyncMap<K, V> {
    inner: Mutex<HashMap<K, V>>,
}

impl<K, V> SyncMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Get a value by key (cloned)
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    /// Insert a value, returning the previous one
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.inner.lock().insert(key, value)
    }

    /// Insert only when the key is absent; returns whether the value was stored
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        let mut map = self.inner.lock();
        if map.contains_key(&key) {
            return false;
        }
        map.insert(key, value);
        true
    }

    /// Remove a value by key
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().remove(key)
    }

    /// Check if key exists
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all keys
    pub fn keys(&self) -> Vec<K> {
        self.inner.lock().keys().cloned().collect()
    }

    /// Snapshot of all values
    pub fn values(&self) -> Vec<V> {
        self.inner.lock().values().cloned().collect()
    }

    /// Snapshot of values matching a predicate
    pub fn filter_values<F>(&self, mut predicate: F) -> Vec<V>
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.inner
            .lock()
            .iter()
            .filter(|(k, v)| predicate(k, v))
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// First value matching a predicate (iteration order is unspecified)
    pub fn find<F>(&self, mut predicate: F) -> Option<V>
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.inner
            .lock()
            .iter()
            .find(|(k, v)| predicate(k, v))
            .map(|(_, v)| v.clone())
    }

    /// Keep only entries matching the predicate; returns how many were removed
    pub fn retain<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut map = self.inner.lock();
        let before = map.len();
        map.retain(|k, v| predicate(k, v));
        before - map.len()
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl<K, V> Default for SyncMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Arc-wrapped SyncMap for shared ownership
pub type SharedMap<K, V> = Arc<SyncMap<K, V>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sync_map_basic_operations() {
        let map: SyncMap<String, i32> = SyncMap::new();

        assert!(map.is_empty());

        map.insert("one".to_string(), 1);
        map.insert("two".to_string(), 2);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&"one".to_string()), Some(1));
        assert!(map.contains(&"two".to_string()));

        map.remove(&"one".to_string());
        assert_eq!(map.len(), 1);

        map.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn test_insert_if_absent_keeps_first_value() {
        let map: SyncMap<&str, i32> = SyncMap::new();
        assert!(map.insert_if_absent("key", 1));
        assert!(!map.insert_if_absent("key", 2));
        assert_eq!(map.get(&"key"), Some(1));
    }

    #[test]
    fn test_retain_reports_removed_count() {
        let map: SyncMap<i32, i32> = SyncMap::new();
        for i in 0..10 {
            map.insert(i, i * 10);
        }
        let removed = map.retain(|k, _| k % 2 == 0);
        assert_eq!(removed, 5);
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn test_filter_and_find() {
        let map: SyncMap<i32, &str> = SyncMap::new();
        map.insert(1, "alpha");
        map.insert(2, "beta");
        map.insert(3, "alphabet");

        let mut alphas = map.filter_values(|_, v| v.starts_with("alpha"));
        alphas.sort();
        assert_eq!(alphas, vec!["alpha", "alphabet"]);
        assert_eq!(map.find(|k, _| *k == 2), Some("beta"));
        assert_eq!(map.find(|_, v| v.is_empty()), None);
    }

    #[test]
    fn test_concurrent_insert_if_absent_stores_once() {
        let map: SharedMap<u32, u32> = Arc::new(SyncMap::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    (0..100u32).filter(|i| map.insert_if_absent(*i, worker)).count()
                })
            })
            .collect();

        let stored: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(stored, 100);
        assert_eq!(map.len(), 100);
    }
}
