//! Refresh cadence and cache lifetimes.

use std::time::Duration;

/// TTLs for refreshed data and intervals for the periodic jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Lifetime of `<source>_devices`.
    pub devices_ttl: Duration,

    /// Lifetime of `<source>_stats_<id>`.
    pub stats_ttl: Duration,

    /// Lifetime of `<source>_servings`.
    pub servings_ttl: Duration,

    /// Lifetime of `<source>_plans`.
    pub plans_ttl: Duration,

    /// Lifetime of `dashboard_combined_data` and `dashboard_last_refresh`.
    pub combined_ttl: Duration,

    /// Interval of the `refresh_combined` job.
    pub combined_interval: Duration,

    /// Interval of the `cache_sweep` job.
    pub sweep_interval: Duration,

    /// Run every refresh job once as soon as it is scheduled.
    pub run_immediately: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            devices_ttl: Duration::from_secs(300),
            stats_ttl: Duration::from_secs(180),
            servings_ttl: Duration::from_secs(120),
            plans_ttl: Duration::from_secs(300),
            combined_ttl: Duration::from_secs(3600),
            combined_interval: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            run_immediately: true,
        }
    }
}
