//! Assembly of the cache, sessions, sources and orchestrator from config.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use petdash_cache::CacheConfig;
use petdash_config::{PetdashConfig, SourceConfig, SourceKind};
use petdash_refresh::{
    DashboardCache, DeviceHubConfig, DeviceHubSource, FeederConfig, FeederSource, RefreshConfig,
    RefreshOrchestrator, RefreshSource,
};
use petdash_session::{
    FileSessionStore, HttpApiClient, HttpApiConfig, ResilientSession, SessionConfig,
    SharedSessionStore,
};
use tracing::{debug, info, warn};

type Session = Arc<ResilientSession<HttpApiClient>>;

/// Everything a command needs to refresh dashboard data.
pub struct Dashboard {
    pub orchestrator: Arc<RefreshOrchestrator>,
    sessions: Vec<Session>,
}

impl Dashboard {
    /// Build the dashboard and restore or open a session per enabled source.
    ///
    /// A source whose login fails is still registered; its first refresh
    /// logs in again.
    pub async fn build(config: &PetdashConfig) -> Result<Self> {
        let cache = DashboardCache::new(cache_config(config)).context("invalid [cache] section")?;
        let refresh = refresh_config(config);

        let session_section = config.session();
        let data_dir = session_section.effective_data_dir();
        let store: SharedSessionStore = Arc::new(FileSessionStore::new(&data_dir));

        let mut orchestrator = RefreshOrchestrator::new(cache, refresh.clone());
        let mut sessions = Vec::new();

        for (name, source) in config.enabled_sources() {
            let client = HttpApiClient::new(api_config(name, source)?)
                .with_context(|| format!("failed to create client for source '{}'", name))?;
            let session = Arc::new(ResilientSession::new(
                Arc::new(client),
                Arc::clone(&store),
                SessionConfig::new(name.as_str())
                    .with_freshness_window(session_section.freshness_window())
                    .with_persist_on_success(session_section.persist_on_success),
            ));

            if let Err(e) = session.initialize().await {
                warn!(
                    source = %name,
                    error = %e,
                    "Initial login failed, will retry on first refresh"
                );
            }

            let refresh_source = build_source(name, source, &session, &refresh);
            orchestrator = orchestrator.with_source(refresh_source);
            sessions.push(session);
        }

        info!(
            sources = sessions.len(),
            data_dir = %data_dir.display(),
            "Dashboard assembled"
        );

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            sessions,
        })
    }

    /// Close every session. Persisted sessions survive for the next start.
    pub async fn close(&self) {
        for session in &self.sessions {
            session.close().await;
        }
    }
}

fn cache_config(config: &PetdashConfig) -> CacheConfig {
    let section = config.cache();
    let cache = CacheConfig::new()
        .with_max_entries(section.max_entries)
        .with_sweep_interval(section.sweep_interval());
    match section.default_ttl() {
        Some(ttl) => cache.with_default_ttl(ttl),
        None => cache.without_default_ttl(),
    }
}

fn refresh_config(config: &PetdashConfig) -> RefreshConfig {
    let section = config.refresh();
    RefreshConfig {
        devices_ttl: Duration::from_secs(section.devices_ttl_secs),
        stats_ttl: Duration::from_secs(section.stats_ttl_secs),
        servings_ttl: Duration::from_secs(section.servings_ttl_secs),
        plans_ttl: Duration::from_secs(section.plans_ttl_secs),
        combined_ttl: Duration::from_secs(section.combined_ttl_secs),
        combined_interval: Duration::from_secs(section.combined_interval_secs),
        sweep_interval: config.cache().sweep_interval(),
        run_immediately: section.run_immediately,
    }
}

fn api_config(name: &str, source: &SourceConfig) -> Result<HttpApiConfig> {
    let username = petdash_config::resolve_username(name, source)?;
    let password = petdash_config::resolve_password(name, source)?;
    debug!(
        source = %name,
        username_from = %username.source,
        password_from = %password.source,
        "Resolved credentials"
    );

    let mut api = HttpApiConfig::new(name, source.base_url.as_str());
    let login_path = source.login_path.clone().unwrap_or_else(|| api.login_path.clone());
    api = api.with_login(login_path, username.value, password.value);

    if let Some(pointer) = &source.token_pointer {
        api = api.with_token_pointer(pointer.as_str());
    }
    if let Some(timeout) = source.timeout() {
        api = api.with_timeout(timeout);
    }
    if let Some(marker) = &source.expired_marker {
        api = api.with_expired_marker(Some(marker.clone()));
    }
    Ok(api)
}

fn build_source(
    name: &str,
    source: &SourceConfig,
    session: &Session,
    refresh: &RefreshConfig,
) -> Arc<dyn RefreshSource> {
    match source.kind {
        SourceKind::DeviceHub => {
            let mut hub = DeviceHubConfig::default();
            if let Some(path) = &source.devices_path {
                hub.devices_path = path.clone();
            }
            if !source.stats_paths.is_empty() {
                hub.stats_paths = source.stats_paths.clone();
            }
            Arc::new(DeviceHubSource::new(name, Arc::clone(session), hub, refresh))
        }
        SourceKind::Feeder => {
            let mut feeder = FeederConfig::default();
            if let Some(path) = &source.servings_path {
                feeder.servings_path = path.clone();
            }
            if let Some(path) = &source.plans_path {
                feeder.plans_path = path.clone();
            }
            Arc::new(FeederSource::new(name, Arc::clone(session), feeder, refresh))
        }
    }
}
