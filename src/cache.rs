//! Memoization of per-dataset results.
//!
//! Results are keyed by a [`DatasetKey`] fingerprint (plus whatever extra key
//! the caller needs) and handed out as `Arc`s, so a cache hit returns the very
//! same object as the first computation.

use crate::dataset::DatasetKey;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// Cache sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached results. `None` means unbounded.
    pub capacity: Option<usize>,
}

impl CacheConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
        }
    }

    pub fn unbounded() -> Self {
        Self { capacity: None }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(32)
    }
}

/// Hit/miss counters of a [`Memo`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

/// Keys that carry a dataset fingerprint.
pub trait DatasetKeyed {
    fn dataset_key(&self) -> DatasetKey;
}

impl DatasetKeyed for DatasetKey {
    fn dataset_key(&self) -> DatasetKey {
        *self
    }
}

impl<T> DatasetKeyed for (DatasetKey, T) {
    fn dataset_key(&self) -> DatasetKey {
        self.0
    }
}

/// LRU memo table.
pub struct Memo<K: Hash + Eq, V> {
    cache: LruCache<K, Arc<V>>,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq, V> std::fmt::Debug for Memo<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("size", &self.cache.len())
            .field("capacity", &self.cache.cap())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

impl<K: Hash + Eq + Clone + DatasetKeyed, V> Memo<K, V> {
    pub fn new(config: CacheConfig) -> Self {
        let cache = match config.capacity {
            Some(capacity) => {
                LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
            }
            None => LruCache::unbounded(),
        };
        Self {
            cache,
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &K) -> Option<Arc<V>> {
        if let Some(value) = self.cache.get(key) {
            self.hits += 1;
            Some(Arc::clone(value))
        } else {
            self.misses += 1;
            None
        }
    }

    /// Store a result. Entries for older versions of the same dataset can
    /// never be hit again and are dropped.
    pub fn put(&mut self, key: K, value: Arc<V>) {
        let fresh = key.dataset_key();
        let stale: Vec<K> = self
            .cache
            .iter()
            .map(|(k, _)| k)
            .filter(|k| {
                let old = k.dataset_key();
                old.id == fresh.id && old.version < fresh.version
            })
            .cloned()
            .collect();
        if !stale.is_empty() {
            debug!(data_id = fresh.id, evicted = stale.len(), "dropping stale cache entries");
            for k in &stale {
                self.cache.pop(k);
            }
        }
        self.cache.put(key, value);
    }

    /// Store `value` unless another caller stored a result for `key` first,
    /// and return whichever result is now cached.
    pub fn put_if_absent(&mut self, key: K, value: Arc<V>) -> Arc<V> {
        if let Some(existing) = self.cache.get(&key) {
            return Arc::clone(existing);
        }
        self.put(key, Arc::clone(&value));
        value
    }

    /// Drop one entry.
    pub fn remove(&mut self, key: &K) -> bool {
        self.cache.pop(key).is_some()
    }

    /// Drop every entry computed for dataset `id`, whatever its version.
    pub fn invalidate(&mut self, id: u64) -> usize {
        let keys: Vec<K> = self
            .cache
            .iter()
            .map(|(k, _)| k)
            .filter(|k| k.dataset_key().id == id)
            .cloned()
            .collect();
        for k in &keys {
            self.cache.pop(k);
        }
        keys.len()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.cache.len(),
        }
    }
}
