//! Source credential resolution.
//!
//! Resolution order:
//! 1. Environment variable (`PETDASH_<SOURCE>_USERNAME` / `PETDASH_<SOURCE>_PASSWORD`)
//! 2. Config file (passwords here produce a load warning)

use crate::{ConfigError, Result, SourceConfig};

/// Result of credential resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Config file.
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// Environment variable for one credential of a source.
///
/// Non-alphanumeric characters in the source name become `_`.
pub fn env_var_name(source_name: &str, field: &str) -> String {
    let source: String = source_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("PETDASH_{}_{}", source, field.to_ascii_uppercase())
}

/// Resolve the login username for a source.
pub fn resolve_username(source_name: &str, source: &SourceConfig) -> Result<ResolvedSecret> {
    resolve(source_name, "username", source.username.as_deref())
}

/// Resolve the login password for a source.
pub fn resolve_password(source_name: &str, source: &SourceConfig) -> Result<ResolvedSecret> {
    resolve(source_name, "password", source.password.as_deref())
}

fn resolve(
    source_name: &str,
    field: &'static str,
    config_value: Option<&str>,
) -> Result<ResolvedSecret> {
    let env_var = env_var_name(source_name, field);
    if let Ok(value) = std::env::var(&env_var)
        && !value.is_empty()
    {
        return Ok(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(env_var),
        });
    }

    match config_value {
        Some(value) if !value.is_empty() => Ok(ResolvedSecret {
            value: value.to_string(),
            source: SecretSource::ConfigFile,
        }),
        _ => Err(ConfigError::MissingCredential {
            source_name: source_name.to_string(),
            field,
            env_var,
        }),
    }
}
