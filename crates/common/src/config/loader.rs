//! # Configuration Loader
//!
//! Figment-based configuration loading with layered support:
//! 1. Compiled defaults
//! 2. Configuration file (TOML)
//! 3. Environment variable overrides
//!
//! Command-line overrides are applied by the caller on top of the result.

use crate::error::ConfigurationError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable prefix for the supervisor agents
pub const DEFAULT_ENV_PREFIX: &str = "ATLANTIS";

/// Configuration loading options
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Optional path to configuration file
    pub config_path: Option<PathBuf>,
    /// Environment variable prefix
    pub env_prefix: String,
    /// Whether configuration file is required
    pub require_file: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            require_file: false,
        }
    }
}

/// Load configuration with custom options
///
/// # Configuration Layer Priority (highest to lowest)
/// 1. Environment variables (`<PREFIX>_*`, nested fields split on `__`)
/// 2. Configuration file
/// 3. Compiled defaults
pub fn load_config_with_options<T>(options: LoadOptions) -> Result<T, ConfigurationError>
where
    T: Default + DeserializeOwned + serde::Serialize,
{
    debug!("Loading configuration with options: {:?}", options);

    let mut figment = Figment::new().merge(Serialized::defaults(T::default()));

    if let Some(path) = &options.config_path {
        if path.exists() {
            info!("Loading configuration from file: {}", path.display());
            figment = add_file_provider(figment, path)?;
        } else if options.require_file {
            return Err(ConfigurationError::FileNotFound {
                path: path.display().to_string(),
            });
        } else {
            debug!(
                "Configuration file not found: {} (using defaults)",
                path.display()
            );
        }
    }

    figment = figment.merge(
        Env::prefixed(&format!("{}_", options.env_prefix))
            .split("__")
            .ignore(&["PATH", "HOME", "USER"]),
    );

    let config: T = figment
        .extract()
        .map_err(|err| ConfigurationError::ParseError {
            details: format!("Failed to parse configuration: {err}"),
        })?;

    debug!(
        "Configuration loaded from {} sources",
        figment.metadata().count()
    );

    Ok(config)
}

/// Add file provider to figment based on file extension
fn add_file_provider(figment: Figment, path: &Path) -> Result<Figment, ConfigurationError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("toml");

    match extension.to_lowercase().as_str() {
        "toml" => Ok(figment.merge(Toml::file(path))),
        _ => Err(ConfigurationError::ParseError {
            details: format!(
                "Unsupported configuration file format: {extension} (supported: toml)"
            ),
        }),
    }
}
