//! Error handling for the Atlantis supervisor agents
//!
//! Each domain gets its own `thiserror` enum. Library code returns these typed
//! errors; binaries wrap them in `anyhow` at the edges.

use std::path::PathBuf;
use thiserror::Error;

/// Base trait for all Atlantis-specific errors
///
/// Every error crossing a task boundary must be `Send + Sync + 'static`.
pub trait AtlantisError: std::error::Error + Send + Sync + 'static {}

/// Configuration-related errors
///
/// These errors occur during configuration loading, parsing, or validation.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration parsing failed
    #[error("Failed to parse configuration: {details}")]
    ParseError { details: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {key}: {value} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {details}")]
    ValidationFailed { details: String },
}

impl AtlantisError for ConfigurationError {}

/// Remote command execution errors
#[derive(Error, Debug)]
pub enum RemoteCommandError {
    /// Connection details rejected before anything was spawned
    #[error("Invalid SSH connection details: {reason}")]
    InvalidDetails { reason: String },

    /// The local ssh client could not be started or waited on
    #[error("Failed to execute SSH command: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },

    /// The remote command or the transport exited unsuccessfully.
    ///
    /// Only the status is rendered; stderr can span many lines.
    #[error("{status}")]
    Failed { status: String, stderr: String },
}

impl AtlantisError for RemoteCommandError {}

/// Persistence errors for on-disk bookkeeping
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// File I/O error
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another process holds the lock
    #[error("{} is locked by another process", path.display())]
    Locked { path: PathBuf },

    /// Key that cannot be stored as a single directory entry
    #[error("Invalid marker name: {name:?}")]
    InvalidName { name: String },
}

impl AtlantisError for PersistenceError {}

impl PersistenceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
