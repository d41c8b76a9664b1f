use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Capacity and expiry for one cache site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 512,
            ttl_seconds: 1800,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn new(capacity: usize, ttl_seconds: u64) -> Self {
        Self {
            capacity,
            ttl_seconds,
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("cache capacity must be > 0".to_string());
        }
        if self.ttl_seconds == 0 {
            return Err("cache ttl_seconds must be > 0".to_string());
        }
        Ok(())
    }
}

/// Point-in-time counters for a cache site
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
}

impl CacheStats {
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry<V> {
    inserted: Instant,
    value: V,
}

/// Thread-safe LRU cache whose entries also expire after a TTL.
///
/// Reads take the shared lock and only promote the entry when the write lock is free, so a
/// hot read path never blocks behind another reader. Expired entries are dropped when touched
/// and a few are purged from the cold end on every insert.
pub struct TtlCache<K: Hash + Eq, V> {
    inner: RwLock<LruCache<K, Entry<V>>>,
    ttl: Duration,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

const PURGE_BATCH: usize = 8;

impl<K: Hash + Eq + Clone, V: Clone> TtlCache<K, V> {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: RwLock::new(LruCache::new(capacity)),
            ttl: config.ttl(),
            capacity: capacity.get(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let (value, stale) = match self.inner.read() {
            Ok(guard) => match guard.peek(key) {
                Some(entry) if entry.inserted.elapsed() <= self.ttl => {
                    (Some(entry.value.clone()), false)
                }
                Some(_) => (None, true),
                None => (None, false),
            },
            Err(_) => (None, false),
        };

        if stale {
            if let Ok(mut guard) = self.inner.write() {
                guard.pop(key);
            }
            self.expired.fetch_add(1, Ordering::Relaxed);
        }

        match value {
            Some(value) => {
                if let Ok(mut guard) = self.inner.try_write() {
                    guard.promote(key);
                }
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let Ok(mut guard) = self.inner.write() else {
            log::warn!("cache lock poisoned; dropping insert");
            return;
        };
        let mut purged = 0u64;
        for _ in 0..PURGE_BATCH {
            match guard.peek_lru() {
                Some((_, entry)) if entry.inserted.elapsed() > self.ttl => {
                    guard.pop_lru();
                    purged += 1;
                }
                _ => break,
            }
        }
        if purged > 0 {
            self.expired.fetch_add(purged, Ordering::Relaxed);
        }
        guard.put(
            key,
            Entry {
                inserted: Instant::now(),
                value,
            },
        );
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner
            .write()
            .ok()
            .and_then(|mut guard| guard.pop(key))
            .map(|entry| entry.value)
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map_or(0, |guard| guard.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
