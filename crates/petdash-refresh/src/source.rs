//! The refresh source trait and the cache keys sources write.

use async_trait::async_trait;
use petdash_cache::ExpiringCache;

use crate::error::Result;
use crate::model::Snapshot;

/// The cache every source writes into and readers serve from.
pub type DashboardCache = ExpiringCache<Snapshot>;

/// Aggregated report of the latest combined refresh.
pub const COMBINED_KEY: &str = "dashboard_combined_data";

/// Time of the latest combined refresh.
pub const LAST_REFRESH_KEY: &str = "dashboard_last_refresh";

pub fn devices_key(source: &str) -> String {
    format!("{}_devices", source)
}

pub fn stats_key(source: &str, device_id: &str) -> String {
    format!("{}_stats_{}", source, device_id)
}

pub fn servings_key(source: &str) -> String {
    format!("{}_servings", source)
}

pub fn plans_key(source: &str) -> String {
    format!("{}_plans", source)
}

/// One remote data source that can refresh its slice of the cache.
#[async_trait]
pub trait RefreshSource: Send + Sync {
    /// Unique name, used as the cache key prefix and in job names.
    fn name(&self) -> &str;

    /// Fetch from the remote and write into `cache`.
    ///
    /// Returns the number of entries written. On error the cache keeps
    /// whatever it held before for the keys that weren't written.
    async fn refresh(&self, cache: &DashboardCache) -> Result<usize>;
}
