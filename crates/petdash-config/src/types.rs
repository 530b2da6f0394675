//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [cache]                  # dashboard cache capacity and sweep
//! [refresh]                # TTLs and combined refresh cadence
//! [session]                # persisted login sessions
//! [sources.petkit]         # one remote device API per table
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application name used for default directories.
pub(crate) const APP_NAME: &str = "petdash";

/// Environment variable overriding the session data directory.
const DATA_DIR_ENV: &str = "PETDASH_DATA_DIR";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., a project-local
/// override) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PetdashConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<RefreshSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSection>,

    /// Remote device APIs, keyed by source name.
    pub sources: BTreeMap<String, SourceConfig>,
}

impl PetdashConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections replace wholesale; sources are merged by name.
    pub fn merge(&mut self, other: PetdashConfig) {
        if other.cache.is_some() {
            self.cache = other.cache;
        }

        if other.refresh.is_some() {
            self.refresh = other.refresh;
        }

        if other.session.is_some() {
            self.session = other.session;
        }

        for (name, source) in other.sources {
            self.sources.insert(name, source);
        }
    }

    /// Cache section, or defaults.
    pub fn cache(&self) -> CacheSection {
        self.cache.clone().unwrap_or_default()
    }

    /// Refresh section, or defaults.
    pub fn refresh(&self) -> RefreshSection {
        self.refresh.clone().unwrap_or_default()
    }

    /// Session section, or defaults.
    pub fn session(&self) -> SessionSection {
        self.session.clone().unwrap_or_default()
    }

    /// Enabled sources, in name order.
    pub fn enabled_sources(&self) -> impl Iterator<Item = (&String, &SourceConfig)> {
        self.sources.iter().filter(|(_, source)| source.enabled)
    }

    /// A copy with every password replaced, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for source in config.sources.values_mut() {
            if source.password.is_some() {
                source.password = Some("********".to_string());
            }
        }
        config
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────────────

/// Dashboard cache settings.
///
/// ```toml
/// [cache]
/// max_entries = 1000
/// sweep_interval_secs = 60
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub max_entries: usize,

    /// TTL for entries written without one. Unset means no expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl_secs: Option<u64>,

    pub sweep_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl_secs: None,
            sweep_interval_secs: 60,
        }
    }
}

impl CacheSection {
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_secs.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Refresh
// ─────────────────────────────────────────────────────────────────────────────

/// Refresh cadence and lifetimes of refreshed data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSection {
    /// Interval of the combined refresh job, which fetches every source.
    pub combined_interval_secs: u64,

    pub devices_ttl_secs: u64,
    pub stats_ttl_secs: u64,
    pub servings_ttl_secs: u64,
    pub plans_ttl_secs: u64,

    /// Lifetime of the combined report and the last-refresh stamp.
    pub combined_ttl_secs: u64,

    /// Run each refresh job once at startup instead of after one interval.
    pub run_immediately: bool,
}

impl Default for RefreshSection {
    fn default() -> Self {
        Self {
            combined_interval_secs: 300,
            devices_ttl_secs: 300,
            stats_ttl_secs: 180,
            servings_ttl_secs: 120,
            plans_ttl_secs: 300,
            combined_ttl_secs: 3600,
            run_immediately: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Persisted session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Persisted sessions older than this are ignored at startup.
    pub freshness_minutes: u64,

    /// Re-save the session after each successful call.
    pub persist_on_success: bool,

    /// Where session files are kept. Default: platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            freshness_minutes: 30,
            persist_on_success: true,
            data_dir: None,
        }
    }
}

impl SessionSection {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_minutes.saturating_mul(60))
    }

    /// Get the effective data directory.
    ///
    /// Resolution order:
    /// 1. `PETDASH_DATA_DIR` environment variable
    /// 2. Configured `data_dir`
    /// 3. Platform data dir (`~/.local/share/petdash` on Linux)
    pub fn effective_data_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV)
            && !dir.is_empty()
        {
            return PathBuf::from(dir);
        }

        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_NAME)
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sources
// ─────────────────────────────────────────────────────────────────────────────

/// What a source's API serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Device list plus per-device stats.
    DeviceHub,
    /// Servings and feeding plans.
    Feeder,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::DeviceHub => f.pad("device_hub"),
            SourceKind::Feeder => f.pad("feeder"),
        }
    }
}

/// One remote device API.
///
/// ```toml
/// [sources.petkit]
/// kind = "device_hub"
/// base_url = "https://api.example.com/v1"
/// username = "me@example.com"
/// stats_paths = ["/devices/{id}/stats/daily", "/stats/{id}"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub base_url: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_path: Option<String>,

    /// JSON pointer to the token in the login response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_pointer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password (prefer `PETDASH_<SOURCE>_PASSWORD`; warns if set here).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices_path: Option<String>,

    /// Stats endpoints tried in order; `{id}` is replaced by the device id.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stats_paths: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plans_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Text marking an expired session inside a 200 response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_marker: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl SourceConfig {
    pub fn new(kind: SourceKind, base_url: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
            enabled: true,
            login_path: None,
            token_pointer: None,
            username: None,
            password: None,
            devices_path: None,
            stats_paths: Vec::new(),
            servings_path: None,
            plans_path: None,
            timeout_secs: None,
            expired_marker: None,
        }
    }

    /// Returns true if a password is stored directly in the config file.
    pub fn has_plaintext_password(&self) -> bool {
        self.password.is_some()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[cache]
max_entries = 500
default_ttl_secs = 600

[refresh]
combined_interval_secs = 120
run_immediately = false

[session]
freshness_minutes = 10
data_dir = "/var/lib/petdash"

[sources.petkit]
kind = "device_hub"
base_url = "https://hub.example.com"
username = "cat@example.com"
stats_paths = ["/devices/{id}/stats", "/stats/{id}"]

[sources.cloudpets]
kind = "feeder"
base_url = "https://feeder.example.com"
enabled = false
"#;

    #[test]
    fn test_parse_full_config() {
        let config = PetdashConfig::from_toml(FULL).unwrap();

        let cache = config.cache();
        assert_eq!(cache.max_entries, 500);
        assert_eq!(cache.default_ttl(), Some(Duration::from_secs(600)));
        assert_eq!(cache.sweep_interval(), Duration::from_secs(60));

        let refresh = config.refresh();
        assert_eq!(refresh.combined_interval_secs, 120);
        assert_eq!(refresh.stats_ttl_secs, 180);
        assert!(!refresh.run_immediately);

        let session = config.session();
        assert_eq!(session.freshness_window(), Duration::from_secs(600));
        assert!(session.persist_on_success);

        let petkit = &config.sources["petkit"];
        assert_eq!(petkit.kind, SourceKind::DeviceHub);
        assert_eq!(petkit.stats_paths.len(), 2);
        assert!(petkit.enabled);

        let cloudpets = &config.sources["cloudpets"];
        assert_eq!(cloudpets.kind, SourceKind::Feeder);
        assert!(!cloudpets.enabled);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PetdashConfig::from_toml("").unwrap();
        assert!(config.cache.is_none());
        assert_eq!(config.cache(), CacheSection::default());
        assert_eq!(config.refresh().combined_ttl_secs, 3600);
        assert_eq!(config.session().freshness_minutes, 30);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_unknown_source_kind_rejected() {
        let toml = r#"
[sources.x]
kind = "toaster"
base_url = "http://localhost"
"#;
        assert!(PetdashConfig::from_toml(toml).is_err());
    }

    #[test]
    fn test_merge_overrides_sections_and_sources() {
        let mut base = PetdashConfig::from_toml(FULL).unwrap();
        let overlay = PetdashConfig::from_toml(
            r#"
[cache]
max_entries = 50

[sources.petkit]
kind = "device_hub"
base_url = "http://localhost:9000"

[sources.fountain]
kind = "device_hub"
base_url = "http://localhost:9001"
"#,
        )
        .unwrap();

        base.merge(overlay);

        assert_eq!(base.cache().max_entries, 50);
        // Untouched sections survive
        assert_eq!(base.refresh().combined_interval_secs, 120);
        assert_eq!(base.sources["petkit"].base_url, "http://localhost:9000");
        assert!(base.sources["petkit"].username.is_none());
        assert!(base.sources.contains_key("cloudpets"));
        assert!(base.sources.contains_key("fountain"));
    }

    #[test]
    fn test_toml_roundtrip_preserves_sources() {
        let config = PetdashConfig::from_toml(FULL).unwrap();
        let reparsed = PetdashConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_enabled_sources_skips_disabled() {
        let config = PetdashConfig::from_toml(FULL).unwrap();
        let names: Vec<&String> = config.enabled_sources().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["petkit"]);
    }

    #[test]
    fn test_redacted_hides_passwords() {
        let mut config = PetdashConfig::new();
        let mut source = SourceConfig::new(SourceKind::Feeder, "http://localhost");
        source.password = Some("hunter2".to_string());
        config.sources.insert("cloudpets".to_string(), source);

        let redacted = config.redacted();
        assert_eq!(
            redacted.sources["cloudpets"].password.as_deref(),
            Some("********")
        );
        assert!(!redacted.to_toml().unwrap().contains("hunter2"));
    }

    #[test]
    fn test_huge_freshness_saturates() {
        let session = SessionSection {
            freshness_minutes: u64::MAX,
            ..Default::default()
        };
        assert_eq!(session.freshness_window(), Duration::from_secs(u64::MAX));
    }
}
