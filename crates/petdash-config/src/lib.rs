//! Configuration for the petdash dashboard backend.
//!
//! Provides TOML-based configuration with:
//! - Cache, refresh and session sections with sensible defaults
//! - Named remote sources (`[sources.petkit]`, `[sources.cloudpets]`, ...)
//! - Config file layering (user config dir + project-local overrides)
//! - Credential resolution (env var, then config file)

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    save_config, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{ResolvedSecret, SecretSource, resolve_password, resolve_username};
pub use types::*;
