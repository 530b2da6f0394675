//! Runs refresh sources individually, together, or on a schedule.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use petdash_scheduler::TaskScheduler;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RefreshConfig;
use crate::error::{RefreshError, Result};
use crate::model::Snapshot;
use crate::report::{RefreshReport, SourceOutcome};
use crate::source::{COMBINED_KEY, DashboardCache, LAST_REFRESH_KEY, RefreshSource};

/// Name of the job that runs every source together.
pub const COMBINED_JOB: &str = "refresh_combined";

/// Name of the job that purges expired cache entries.
pub const SWEEP_JOB: &str = "cache_sweep";

/// Snapshot of cache occupancy and freshness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub size: usize,
    pub capacity: usize,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Coordinates sources, the dashboard cache, and the periodic jobs.
pub struct RefreshOrchestrator {
    cache: DashboardCache,
    config: RefreshConfig,
    sources: Vec<Arc<dyn RefreshSource>>,
}

impl RefreshOrchestrator {
    pub fn new(cache: DashboardCache, config: RefreshConfig) -> Self {
        Self {
            cache,
            config,
            sources: Vec::new(),
        }
    }

    /// Add a source. A source with the same name replaces the earlier one.
    pub fn with_source(mut self, source: Arc<dyn RefreshSource>) -> Self {
        self.sources.retain(|existing| existing.name() != source.name());
        self.sources.push(source);
        self
    }

    pub fn cache(&self) -> &DashboardCache {
        &self.cache
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Names of registered sources, in registration order.
    pub fn source_names(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|source| source.name().to_string())
            .collect()
    }

    fn find_source(&self, name: &str) -> Result<&Arc<dyn RefreshSource>> {
        self.sources
            .iter()
            .find(|source| source.name() == name)
            .ok_or_else(|| RefreshError::UnknownSource(name.to_string()))
    }

    /// Refresh one source, surfacing its error.
    pub async fn refresh_source(&self, name: &str) -> Result<usize> {
        let source = self.find_source(name)?;
        let written = source.refresh(&self.cache).await?;
        debug!(source = %name, entries = written, "Source refreshed");
        Ok(written)
    }

    /// Refresh every source concurrently.
    ///
    /// Failures are collected in the report rather than returned. The report
    /// is cached under `dashboard_combined_data` and the completion time under
    /// `dashboard_last_refresh`, whether or not any source failed.
    pub async fn refresh_combined(&self) -> RefreshReport {
        let started_at = Utc::now();
        info!(sources = self.sources.len(), "Refreshing all sources");

        let outcomes = join_all(
            self.sources
                .iter()
                .map(|source| self.run_source(source.as_ref())),
        )
        .await;

        let report = RefreshReport {
            started_at,
            finished_at: Utc::now(),
            sources: outcomes,
        };

        match serde_json::to_value(&report) {
            Ok(value) => {
                self.cache
                    .set(
                        COMBINED_KEY,
                        Snapshot::Json(value),
                        Some(self.config.combined_ttl),
                    )
                    .await;
            }
            Err(e) => warn!(error = %e, "Failed to serialize refresh report"),
        }

        self.cache
            .set(
                LAST_REFRESH_KEY,
                Snapshot::Timestamp(report.finished_at),
                Some(self.config.combined_ttl),
            )
            .await;

        if report.is_complete() {
            info!(entries = report.entries_written(), "Combined refresh complete");
        } else {
            warn!(
                failed = report.failed_count(),
                total = report.sources.len(),
                failures = %report.failure_summary(),
                "Combined refresh finished with failures"
            );
        }

        report
    }

    /// Run a combined refresh now and fail if any source failed.
    ///
    /// The cache is updated exactly as by [`refresh_combined`](Self::refresh_combined);
    /// the error carries the full report.
    pub async fn force_refresh(&self) -> Result<RefreshReport> {
        let report = self.refresh_combined().await;

        if report.is_complete() {
            Ok(report)
        } else if report.succeeded().next().is_none() {
            Err(RefreshError::AllFailed { report })
        } else {
            Err(RefreshError::Partial { report })
        }
    }

    /// Read a cached value, refreshing `source` once on a miss.
    pub async fn read_through(&self, source: &str, key: &str) -> Result<Option<Snapshot>> {
        if let Some(value) = self.cache.get(key).await {
            return Ok(Some(value));
        }

        debug!(source = %source, key = %key, "Cache miss, refreshing source");
        self.refresh_source(source).await?;
        Ok(self.cache.get(key).await)
    }

    /// Cache occupancy and the time of the last combined refresh.
    pub async fn status(&self) -> CacheStatus {
        let last_refresh = self
            .cache
            .peek(LAST_REFRESH_KEY)
            .await
            .and_then(|snapshot| snapshot.as_timestamp());

        CacheStatus {
            size: self.cache.size().await,
            capacity: self.cache.capacity(),
            last_refresh,
        }
    }

    /// Register the periodic jobs: `refresh_combined`, which refreshes every
    /// source in one pass, and `cache_sweep`.
    ///
    /// Each source is fetched by exactly one job, so a tick never hits the
    /// same remote API twice.
    pub fn register_jobs(self: &Arc<Self>, scheduler: &TaskScheduler) -> Result<()> {
        let run_immediately = self.config.run_immediately;

        let orchestrator = Arc::clone(self);
        scheduler.add_task(
            COMBINED_JOB,
            move || {
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    let report = orchestrator.refresh_combined().await;
                    if report.is_complete() {
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!(report.failure_summary()))
                    }
                }
            },
            self.config.combined_interval,
            run_immediately,
        )?;

        let cache = self.cache.clone();
        scheduler.add_task(
            SWEEP_JOB,
            move || {
                let cache = cache.clone();
                async move {
                    let purged = cache.purge_expired().await;
                    if purged > 0 {
                        debug!(purged, "Cache sweep removed expired entries");
                    }
                    Ok(())
                }
            },
            self.config.sweep_interval,
            false,
        )?;

        info!(sources = self.sources.len(), "Refresh jobs registered");
        Ok(())
    }

    async fn run_source(&self, source: &dyn RefreshSource) -> SourceOutcome {
        let start = Instant::now();
        let result = source.refresh(&self.cache).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(entries) => SourceOutcome {
                source: source.name().to_string(),
                entries,
                error: None,
                elapsed_ms,
            },
            Err(e) => {
                warn!(source = %source.name(), error = %e, "Source refresh failed");
                SourceOutcome {
                    source: source.name().to_string(),
                    entries: 0,
                    error: Some(e.to_string()),
                    elapsed_ms,
                }
            }
        }
    }
}
