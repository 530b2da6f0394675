//! Litter box cloud: device list plus per-device daily stats.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use petdash_session::{FallbackChain, HttpApiClient, RemoteError, ResilientSession};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::RefreshConfig;
use crate::error::{RefreshError, Result};
use crate::model::{Snapshot, parse_devices};
use crate::source::{DashboardCache, RefreshSource, devices_key, stats_key};

/// Placeholder replaced by the device id in stats paths.
pub const DEVICE_ID_PLACEHOLDER: &str = "{id}";

/// Endpoints of a device hub API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHubConfig {
    /// Path returning the device list.
    pub devices_path: String,

    /// Candidate paths for one device's daily stats, tried in order.
    /// Each may contain `{id}`.
    pub stats_paths: Vec<String>,
}

impl Default for DeviceHubConfig {
    fn default() -> Self {
        Self {
            devices_path: "/devices".to_string(),
            stats_paths: vec!["/devices/{id}/stats/daily".to_string()],
        }
    }
}

/// Refreshes `<source>_devices` and `<source>_stats_<id>`.
pub struct DeviceHubSource {
    name: String,
    session: Arc<ResilientSession<HttpApiClient>>,
    config: DeviceHubConfig,
    devices_ttl: Duration,
    stats_ttl: Duration,
    stats_failures: AtomicU64,
}

impl DeviceHubSource {
    pub fn new(
        name: impl Into<String>,
        session: Arc<ResilientSession<HttpApiClient>>,
        config: DeviceHubConfig,
        refresh: &RefreshConfig,
    ) -> Self {
        Self {
            name: name.into(),
            session,
            config,
            devices_ttl: refresh.devices_ttl,
            stats_ttl: refresh.stats_ttl,
            stats_failures: AtomicU64::new(0),
        }
    }

    /// Per-device stats fetches that failed since this source was created.
    pub fn stats_failures(&self) -> u64 {
        self.stats_failures.load(Ordering::Relaxed)
    }

    /// Fetch one device's stats, trying each configured path in turn.
    ///
    /// The whole chain runs inside the session call, so an expired session
    /// on any candidate triggers a re-login and one retry of the chain.
    async fn fetch_stats(&self, device_id: &str) -> std::result::Result<Value, RemoteError> {
        let paths: Vec<String> = self
            .config
            .stats_paths
            .iter()
            .map(|template| template.replace(DEVICE_ID_PLACEHOLDER, device_id))
            .collect();
        let paths = &paths;

        self.session
            .call(move |api, credentials| async move {
                let mut chain = FallbackChain::new();
                for path in paths {
                    let credentials = credentials.clone();
                    chain = chain.candidate(path.clone(), move || async move {
                        api.get_json(&credentials, path).await
                    });
                }
                chain.run().await.map_err(RemoteError::from)
            })
            .await
    }
}

#[async_trait]
impl RefreshSource for DeviceHubSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn refresh(&self, cache: &DashboardCache) -> Result<usize> {
        let devices_path = self.config.devices_path.as_str();
        let body = self
            .session
            .call(move |api, credentials| async move {
                api.get_json(&credentials, devices_path).await
            })
            .await
            .map_err(|e| RefreshError::remote(&self.name, e))?;

        let devices =
            parse_devices(&body).map_err(|message| RefreshError::payload(&self.name, message))?;

        cache
            .set(
                &devices_key(&self.name),
                Snapshot::Devices(devices.clone()),
                Some(self.devices_ttl),
            )
            .await;
        let mut written = 1;

        if self.config.stats_paths.is_empty() {
            debug!(source = %self.name, "No stats endpoints configured");
        } else {
            for device in devices.iter().filter(|d| d.kind.is_known()) {
                match self.fetch_stats(&device.id).await {
                    Ok(stats) => {
                        cache
                            .set(
                                &stats_key(&self.name, &device.id),
                                Snapshot::Json(stats),
                                Some(self.stats_ttl),
                            )
                            .await;
                        written += 1;
                    }
                    Err(e) => {
                        self.stats_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            source = %self.name,
                            device = %device.id,
                            error = %e,
                            "Failed to refresh device stats"
                        );
                    }
                }
            }
        }

        info!(source = %self.name, devices = devices.len(), entries = written, "Device hub refreshed");
        Ok(written)
    }
}
