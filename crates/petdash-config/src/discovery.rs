//! Locating, layering and saving `petdash` config files.
//!
//! Layers, lowest precedence first:
//! 1. `<user config dir>/config.toml` (`~/.config/petdash` on Linux)
//! 2. `petdash.toml` in the project directory (cwd by default)
//!
//! Command-line flags are applied by the binary on top of the result.

use std::path::{Path, PathBuf};

use crate::types::APP_NAME;
use crate::{ConfigError, PetdashConfig, Result};

const PROJECT_FILE_NAME: &str = "petdash.toml";
const USER_FILE_NAME: &str = "config.toml";

/// Overrides the platform user config directory when set and non-empty.
const CONFIG_DIR_ENV: &str = "PETDASH_CONFIG_DIR";

/// One candidate config file and whether it contributed to the result.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub loaded: bool,
}

/// The merged config plus a record of how it was assembled.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: PetdashConfig,
    /// Every candidate file, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Skipped layers and plaintext password notices.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Files that were actually merged.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter_map(|source| source.loaded.then_some(source.path.as_path()))
            .collect()
    }
}

/// Discover and merge both layers using the default user config directory.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Discover and merge both layers.
///
/// An explicit `config_dir` wins over `PETDASH_CONFIG_DIR` and the platform
/// default. Missing files are skipped silently; unreadable or invalid ones
/// are skipped with a warning.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let user_layer = config_dir
        .map(|dir| dir.join(USER_FILE_NAME))
        .or_else(user_config_path);
    let project_layer = project_dir
        .map_or_else(|| PathBuf::from(PROJECT_FILE_NAME), |dir| dir.join(PROJECT_FILE_NAME));

    let mut loaded = LoadedConfig {
        config: PetdashConfig::new(),
        sources: Vec::with_capacity(2),
        warnings: Vec::new(),
    };

    for path in user_layer.into_iter().chain(std::iter::once(project_layer)) {
        let merged = match read_layer(&path) {
            Ok(Some(layer)) => {
                loaded.config.merge(layer);
                true
            }
            Ok(None) => false,
            Err(e) => {
                loaded
                    .warnings
                    .push(format!("Failed to load {}: {}", path.display(), e));
                false
            }
        };
        loaded.sources.push(ConfigSource {
            path,
            loaded: merged,
        });
    }

    warn_plaintext_passwords(&loaded.config, &mut loaded.warnings);
    Ok(loaded)
}

/// Parse a single config file.
pub fn load_config_file(path: &Path) -> Result<PetdashConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    PetdashConfig::from_toml(&text)
}

/// Write `config` as TOML, creating missing parent directories.
pub fn save_config(config: &PetdashConfig, path: &Path) -> Result<()> {
    let write_error = |at: &Path, source| ConfigError::WriteFile {
        path: at.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
    }
    std::fs::write(path, config.to_toml()?).map_err(|e| write_error(path, e))
}

/// `config.toml` inside [`user_config_dir`].
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|dir| dir.join(USER_FILE_NAME))
}

/// `PETDASH_CONFIG_DIR`, else the platform config dir joined with `petdash`.
pub fn user_config_dir() -> Option<PathBuf> {
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|dir| dir.join(APP_NAME)),
    }
}

fn read_layer(path: &Path) -> Result<Option<PetdashConfig>> {
    if !path.is_file() {
        return Ok(None);
    }
    load_config_file(path).map(Some)
}

fn warn_plaintext_passwords(config: &PetdashConfig, warnings: &mut Vec<String>) {
    let noisy = config
        .sources
        .iter()
        .filter(|(_, source)| source.has_plaintext_password());

    for (name, _) in noisy {
        warnings.push(format!(
            "[sources.{}] contains a plaintext password; set {} instead",
            name,
            crate::secrets::env_var_name(name, "password")
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
