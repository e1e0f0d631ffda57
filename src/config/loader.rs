//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::env::{apply_env, EnvFallback, CONFIG_FILE};
use crate::config::schema::BobConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A validated configuration plus the environment values that were ignored.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: BobConfig,
    pub fallbacks: Vec<EnvFallback>,
}

fn read_file(path: &Path) -> Result<BobConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Resolve the full configuration: defaults, then the optional `BOB_CONFIG`
/// file, then individual environment variables.
pub fn load_from_env<F>(lookup: F) -> Result<LoadedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match lookup(CONFIG_FILE) {
        Some(path) => read_file(Path::new(&path))?,
        None => BobConfig::default(),
    };

    let fallbacks = apply_env(&mut config, &lookup);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(LoadedConfig { config, fallbacks })
}

/// [`load_from_env`] against the process environment.
pub fn load() -> Result<LoadedConfig, ConfigError> {
    load_from_env(|key| std::env::var(key).ok())
}
