//! Configuration for the expiring cache.

use std::time::Duration;

/// Default maximum number of cached entries.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Default TTL applied when `set` is called without one (none: entries
/// only leave the cache through eviction or deletion).
pub const DEFAULT_TTL: Option<Duration> = None;

/// Default interval for a scheduled sweep of expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the expiring cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before LRU eviction.
    pub max_entries: usize,

    /// TTL used when a `set` call doesn't specify one.
    pub default_ttl: Option<Duration>,

    /// How often an owner should run [`ExpiringCache::purge_expired`].
    ///
    /// The cache itself never spawns tasks; expired entries are always
    /// purged on access regardless of this setting.
    ///
    /// [`ExpiringCache::purge_expired`]: crate::ExpiringCache::purge_expired
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the TTL applied to entries inserted without an explicit one.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Entries inserted without a TTL never expire by time.
    pub fn without_default_ttl(mut self) -> Self {
        self.default_ttl = None;
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
