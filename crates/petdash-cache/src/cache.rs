//! Expiring cache with LRU eviction and per-entry TTL.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Entry stored in the cache.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,

    /// When this entry stops being served (`None` = never, by time).
    /// A TTL past the end of the clock also means never.
    expires_at: Option<Instant>,

    /// Last time the entry was written or read.
    last_access: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
            last_access: now,
        }
    }

    /// An entry is dead from `expires_at` onward, inclusive.
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

/// Inner state protected by the mutex.
///
/// The `LruCache` is both the key map and the recency list, so the two can
/// never disagree.
struct CacheInner<V> {
    lru: LruCache<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<V> CacheInner<V> {
    /// Remove every expired entry, returning how many were dropped.
    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .lru
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.lru.pop(key);
            trace!(key = %key, "Expired cache entry purged");
        }

        self.expirations += expired.len() as u64;
        expired.len()
    }
}

/// Key/value cache with LRU eviction and optional per-entry TTL.
///
/// Cloning the cache is cheap and yields a handle to the same storage, so
/// scheduler jobs and request-time readers can share one instance.
pub struct ExpiringCache<V> {
    inner: Arc<Mutex<CacheInner<V>>>,
    config: CacheConfig,
}

impl<V: Clone + Send + Sync + 'static> ExpiringCache<V> {
    /// Create a new cache.
    ///
    /// Returns [`CacheError::ZeroCapacity`] if `max_entries` is zero.
    pub fn new(config: CacheConfig) -> Result<Self> {
        let cap = NonZeroUsize::new(config.max_entries).ok_or(CacheError::ZeroCapacity)?;

        let inner = CacheInner {
            lru: LruCache::new(cap),
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        };

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
            config,
        })
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.config.max_entries
    }

    /// Insert or replace an entry.
    ///
    /// Resets the entry's TTL and marks it most recently used. `ttl` of
    /// `None` falls back to the configured default TTL. When a new key
    /// arrives at a full cache, the least recently used entry is evicted
    /// before the insert, so the new entry is never the victim.
    pub async fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let now = Instant::now();
        let ttl = ttl.or(self.config.default_ttl);

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if let Some(entry) = inner.lru.get_mut(key) {
            *entry = CacheEntry::new(value, ttl, now);
            trace!(key = %key, "Cache entry replaced");
            return;
        }

        // Reclaim dead entries before choosing a live victim.
        inner.purge_expired(now);

        if inner.lru.len() >= self.config.max_entries
            && let Some((evicted, _)) = inner.lru.pop_lru()
        {
            inner.evictions += 1;
            debug!(key = %evicted, "Evicting least recently used cache entry");
        }

        inner
            .lru
            .put(key.to_string(), CacheEntry::new(value, ttl, now));

        trace!(
            key = %key,
            ttl_secs = ttl.map(|t| t.as_secs_f64()),
            cache_size = inner.lru.len(),
            "Cache entry inserted"
        );
    }

    /// Get a live entry, marking it most recently used.
    ///
    /// All expired entries are purged first. A miss and an expired entry
    /// are indistinguishable to the caller.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        inner.purge_expired(now);

        match inner.lru.get_mut(key) {
            Some(entry) => {
                entry.last_access = now;
                inner.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                inner.misses += 1;
                trace!(key = %key, "Cache miss");
                None
            }
        }
    }

    /// Read a live entry without touching its recency.
    pub async fn peek(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let inner = self.inner.lock().await;
        inner
            .lru
            .peek(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Remove an entry. Returns whether anything was removed.
    pub async fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let removed = inner.lru.pop(key).is_some();
        if removed {
            debug!(key = %key, "Cache entry deleted");
        }
        removed
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.lru.clear();
    }

    /// Whether `key` holds a live entry.
    ///
    /// Behaves like [`get`](Self::get) (including the recency update)
    /// without cloning the value.
    pub async fn exists(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        inner.purge_expired(now);

        match inner.lru.get_mut(key) {
            Some(entry) => {
                entry.last_access = now;
                true
            }
            None => false,
        }
    }

    /// Number of live entries.
    pub async fn size(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.purge_expired(Instant::now());
        inner.lru.len()
    }

    /// Drop every expired entry now, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let count = inner.purge_expired(Instant::now());
        if count > 0 {
            debug!(count = count, "Purged expired cache entries");
        }
        count
    }

    /// Live keys, most recently used first.
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let inner = self.inner.lock().await;
        inner
            .lru
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Time since the entry was last written or read, if it is live.
    pub async fn idle_time(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let inner = self.inner.lock().await;
        inner
            .lru
            .peek(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| now.duration_since(entry.last_access))
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let inner = self.inner.lock().await;
        CacheStats {
            size: inner
                .lru
                .iter()
                .filter(|(_, entry)| !entry.is_expired(now))
                .count(),
            capacity: self.config.max_entries,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
        }
    }
}

impl<V> Clone for ExpiringCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of live entries.
    pub size: usize,

    /// Maximum capacity.
    pub capacity: usize,

    /// Successful lookups.
    pub hits: u64,

    /// Lookups that found nothing live.
    pub misses: u64,

    /// Entries removed to make room.
    pub evictions: u64,

    /// Entries removed because their TTL passed.
    pub expirations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn cache_with_capacity(max: usize) -> ExpiringCache<String> {
        ExpiringCache::new(CacheConfig::new().with_max_entries(max)).unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = cache_with_capacity(10);
        cache.set("k", "v1".to_string(), None).await;

        assert_eq!(cache.get("k").await.as_deref(), Some("v1"));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_set_replaces_value() {
        let cache = cache_with_capacity(10);
        cache.set("k", "v1".to_string(), None).await;
        cache.set("k", "v2".to_string(), None).await;

        assert_eq!(cache.get("k").await.as_deref(), Some("v2"));
        assert_eq!(cache.size().await, 1);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = ExpiringCache::<String>::new(CacheConfig::new().with_max_entries(0));
        assert!(matches!(result, Err(CacheError::ZeroCapacity)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_ttl_never_expires() {
        let cache = cache_with_capacity(10);
        cache
            .set("k", "v1".to_string(), Some(Duration::MAX))
            .await;

        advance(Duration::from_secs(365 * 24 * 3600)).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v1"));
        assert_eq!(cache.purge_expired().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_scenario() {
        let cache = cache_with_capacity(10);
        cache
            .set("k", "v1".to_string(), Some(Duration::from_secs(2)))
            .await;

        advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v1"));

        advance(Duration::from_millis(1010)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_boundary_is_exclusive() {
        let cache = cache_with_capacity(10);
        cache
            .set("k", "v".to_string(), Some(Duration::from_secs(2)))
            .await;

        advance(Duration::from_millis(1999)).await;
        assert!(cache.exists("k").await);

        advance(Duration::from_millis(1)).await;
        assert!(!cache.exists("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_resets_ttl() {
        let cache = cache_with_capacity(10);
        cache
            .set("k", "v1".to_string(), Some(Duration::from_secs(2)))
            .await;

        advance(Duration::from_millis(1500)).await;
        cache
            .set("k", "v2".to_string(), Some(Duration::from_secs(2)))
            .await;

        advance(Duration::from_millis(1500)).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_does_not_extend_ttl() {
        let cache = cache_with_capacity(10);
        cache
            .set("k", "v".to_string(), Some(Duration::from_secs(2)))
            .await;

        advance(Duration::from_millis(1500)).await;
        assert!(cache.get("k").await.is_some());

        advance(Duration::from_millis(600)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_ttl_applies() {
        let config = CacheConfig::new()
            .with_max_entries(10)
            .with_default_ttl(Duration::from_secs(5));
        let cache: ExpiringCache<u32> = ExpiringCache::new(config).unwrap();

        cache.set("short", 1, Some(Duration::from_secs(1))).await;
        cache.set("default", 2, None).await;

        advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("short").await, None);
        assert_eq!(cache.get("default").await, Some(2));

        advance(Duration::from_secs(3)).await;
        assert_eq!(cache.get("default").await, None);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = cache_with_capacity(3);

        for i in 1..=3 {
            cache.set(&format!("key-{}", i), format!("v{}", i), None).await;
        }
        assert_eq!(cache.size().await, 3);

        // A 4th key evicts the first inserted
        cache.set("key-4", "v4".to_string(), None).await;

        assert_eq!(cache.size().await, 3);
        assert!(cache.peek("key-1").await.is_none());
        assert!(cache.peek("key-2").await.is_some());
        assert!(cache.peek("key-3").await.is_some());
        assert!(cache.peek("key-4").await.is_some());
    }

    #[tokio::test]
    async fn test_lru_access_updates_order() {
        let cache = cache_with_capacity(3);

        for i in 1..=3 {
            cache.set(&format!("key-{}", i), format!("v{}", i), None).await;
        }

        // Touch key-1 so key-2 becomes the LRU entry
        assert!(cache.get("key-1").await.is_some());

        cache.set("key-4", "v4".to_string(), None).await;

        assert!(cache.peek("key-1").await.is_some());
        assert!(cache.peek("key-2").await.is_none());
        assert!(cache.peek("key-3").await.is_some());
        assert!(cache.peek("key-4").await.is_some());
    }

    #[tokio::test]
    async fn test_replace_at_capacity_does_not_evict() {
        let cache = cache_with_capacity(2);
        cache.set("a", "1".to_string(), None).await;
        cache.set("b", "2".to_string(), None).await;

        cache.set("a", "1b".to_string(), None).await;

        assert_eq!(cache.size().await, 2);
        assert_eq!(cache.stats().await.evictions, 0);
        assert_eq!(cache.keys().await, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_reclaimed_before_eviction() {
        let cache = cache_with_capacity(2);
        cache.set("live", "1".to_string(), None).await;
        cache
            .set("dying", "2".to_string(), Some(Duration::from_secs(1)))
            .await;

        advance(Duration::from_secs(1)).await;
        cache.set("new", "3".to_string(), None).await;

        assert!(cache.peek("live").await.is_some());
        assert!(cache.peek("new").await.is_some());
        assert_eq!(cache.stats().await.evictions, 0);
    }

    #[tokio::test]
    async fn test_peek_does_not_update_order() {
        let cache = cache_with_capacity(2);
        cache.set("a", "1".to_string(), None).await;
        cache.set("b", "2".to_string(), None).await;

        assert!(cache.peek("a").await.is_some());
        cache.set("c", "3".to_string(), None).await;

        assert!(cache.peek("a").await.is_none());
    }

    #[tokio::test]
    async fn test_exists_updates_order() {
        let cache = cache_with_capacity(2);
        cache.set("a", "1".to_string(), None).await;
        cache.set("b", "2".to_string(), None).await;

        assert!(cache.exists("a").await);
        cache.set("c", "3".to_string(), None).await;

        assert!(cache.exists("a").await);
        assert!(!cache.exists("b").await);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let cache = cache_with_capacity(10);
        cache.set("k", "v".to_string(), None).await;
        cache.set("other", "v".to_string(), None).await;

        assert!(cache.delete("k").await);
        assert!(!cache.delete("k").await);
        assert!(!cache.delete("never-set").await);
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = cache_with_capacity(10);
        cache.clear().await;
        assert_eq!(cache.size().await, 0);

        cache.set("a", "1".to_string(), None).await;
        cache.set("b", "2".to_string(), None).await;
        cache.clear().await;

        assert_eq!(cache.size().await, 0);
        assert!(!cache.exists("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_counts_live_entries() {
        let cache = cache_with_capacity(10);
        cache
            .set("a", "1".to_string(), Some(Duration::from_secs(1)))
            .await;
        cache.set("b", "2".to_string(), None).await;

        assert_eq!(cache.size().await, 2);
        advance(Duration::from_secs(1)).await;
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = cache_with_capacity(10);
        for i in 1..=3 {
            cache
                .set(&format!("key-{}", i), "v".to_string(), Some(Duration::from_millis(50)))
                .await;
        }
        cache.set("forever", "v".to_string(), None).await;

        advance(Duration::from_millis(100)).await;

        assert_eq!(cache.purge_expired().await, 3);
        assert_eq!(cache.keys().await, vec!["forever".to_string()]);
        assert_eq!(cache.stats().await.expirations, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time() {
        let cache = cache_with_capacity(10);
        cache.set("k", "v".to_string(), None).await;

        advance(Duration::from_secs(3)).await;
        assert_eq!(cache.idle_time("k").await, Some(Duration::from_secs(3)));

        cache.get("k").await;
        assert_eq!(cache.idle_time("k").await, Some(Duration::ZERO));
        assert_eq!(cache.idle_time("missing").await, None);
    }

    #[tokio::test]
    async fn test_stats() {
        let cache = cache_with_capacity(2);
        cache.set("a", "1".to_string(), None).await;
        cache.set("b", "2".to_string(), None).await;
        cache.set("c", "3".to_string(), None).await;

        cache.get("c").await;
        cache.get("a").await;

        let stats = cache.stats().await;
        assert_eq!(stats.size, 2);
        assert_eq!(stats.capacity, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let cache = cache_with_capacity(10);
        let handle = cache.clone();

        handle.set("k", "v".to_string(), None).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_concurrent_writers_respect_capacity() {
        let cache: ExpiringCache<usize> =
            ExpiringCache::new(CacheConfig::new().with_max_entries(16)).unwrap();

        let mut handles = Vec::new();
        for worker in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    cache.set(&format!("w{}-{}", worker, i), i, None).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.size().await, 16);
        assert_eq!(cache.keys().await.len(), 16);
    }
}
