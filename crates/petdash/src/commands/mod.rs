//! CLI command handlers.

pub mod config;
pub mod refresh;
pub mod run;

use std::path::PathBuf;

use anyhow::Result;
use petdash_config::LoadedConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// User config directory override.
    pub config_dir: Option<PathBuf>,
    /// Where to look for `petdash.toml`.
    pub project_dir: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Discover and merge config layers, printing load warnings to stderr.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = petdash_config::load_config_with_options(
            self.project_dir.as_deref(),
            self.config_dir.as_deref(),
        )?;

        for warning in &loaded.warnings {
            eprintln!("warning: {}", warning);
        }

        Ok(loaded)
    }
}
