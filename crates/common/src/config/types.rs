//! # Configuration Types
//!
//! Configuration sections shared by every supervisor agent.

use serde::{Deserialize, Serialize};

use crate::error::{AtlantisError, ConfigurationError};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (compact, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Configuration validation trait
pub trait ConfigValidation {
    type Error: AtlantisError;

    /// Validate the configuration
    fn validate(&self) -> Result<(), Self::Error>;

    /// Get configuration warnings (non-fatal issues)
    fn warnings(&self) -> Vec<String> {
        Vec::new()
    }
}

impl ConfigValidation for LoggingConfig {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigurationError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.level.clone(),
                reason: format!("must be one of {}", LEVELS.join(", ")),
            });
        }

        if !matches!(self.format.as_str(), "compact" | "json") {
            return Err(ConfigurationError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.format.clone(),
                reason: "must be compact or json".to_string(),
            });
        }

        Ok(())
    }
}
