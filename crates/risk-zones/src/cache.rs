//! In-process TTL + LRU cache for built grids
//!
//! Concurrent misses for the same key collapse into one build: the first
//! caller builds while later callers wait on a per-key lock and then read the
//! freshly inserted value. Different keys never wait on each other. Failed
//! builds are not stored.
//!
//! Builds run on their own task, so a caller that stops waiting does not
//! cancel the build; its result still lands in the cache.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use lru::LruCache;
use serde::Serialize;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
}

struct CacheEntry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

type BuildLock = Arc<tokio::sync::Mutex<()>>;

pub struct ResultCache<V> {
    ttl: Duration,
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    in_flight: Mutex<HashMap<String, BuildLock>>,
}

impl<V> ResultCache<V> {
    /// `capacity` is clamped to at least one entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock_entries().cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Unexpired value for `key`; refreshes its recency.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let mut entries = self.lock_entries();

        let expired = entries.peek(key)?.expires_at <= Instant::now();
        if expired {
            debug!("Cache entry expired: {}", key);
            entries.pop(key);
            return None;
        }

        entries.get(key).map(|entry| Arc::clone(&entry.value))
    }

    pub fn insert(&self, key: &str, value: Arc<V>) {
        let mut entries = self.lock_entries();
        let now = Instant::now();

        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for stale in &expired {
            entries.pop(stale.as_str());
        }

        let entry = CacheEntry {
            value,
            expires_at: now + self.ttl,
        };
        if let Some((evicted, _)) = entries.push(key.to_string(), entry) {
            if evicted != key {
                debug!("Cache evict: {}", evicted);
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.lock_entries();
        let now = Instant::now();
        CacheStats {
            total_entries: entries.len(),
            valid_entries: entries.iter().filter(|(_, e)| e.expires_at > now).count(),
        }
    }

    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    fn lock_entries(&self) -> MutexGuard<'_, LruCache<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, BuildLock>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<V: Send + Sync + 'static> ResultCache<V> {
    /// Cached value for `key`, or the result of `build`.
    ///
    /// The build runs on a spawned task holding the key's in-flight slot.
    /// Dropping the returned future stops the wait, not the build.
    pub async fn get_or_build<F, Fut, E>(self: &Arc<Self>, key: &str, build: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: From<JoinError> + Send + 'static,
    {
        if let Some(value) = self.get(key) {
            debug!("Cache hit: {}", key);
            return Ok(value);
        }

        let cache = Arc::clone(self);
        let key = key.to_string();
        let task = tokio::spawn(async move { cache.build_once(&key, build).await });
        task.await?
    }

    async fn build_once<F, Fut, E>(&self, key: &str, build: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let flight = InFlight::join(self, key);
        let _permit = flight.lock.lock().await;

        // Another build may have finished while we waited.
        if let Some(value) = self.get(key) {
            debug!("Cache hit after wait: {}", key);
            return Ok(value);
        }

        debug!("Cache miss: {}", key);
        let value = Arc::new(build().await?);
        self.insert(key, Arc::clone(&value));
        Ok(value)
    }
}

/// Membership in the set of builds waiting on one key. The last member out
/// removes the key's lock.
struct InFlight<'a, V> {
    cache: &'a ResultCache<V>,
    key: &'a str,
    lock: BuildLock,
}

impl<'a, V> InFlight<'a, V> {
    fn join(cache: &'a ResultCache<V>, key: &'a str) -> Self {
        let lock = cache
            .lock_in_flight()
            .entry(key.to_string())
            .or_default()
            .clone();
        Self { cache, key, lock }
    }
}

impl<V> Drop for InFlight<'_, V> {
    fn drop(&mut self) {
        let mut in_flight = self.cache.lock_in_flight();
        // Members clone and release only under the map lock, so after
        // releasing ours a count of one means the map holds the last reference.
        drop(std::mem::take(&mut self.lock));
        let idle = in_flight
            .get(self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            in_flight.remove(self.key);
        }
    }
}
