//! # Common Atlantis
//!
//! Shared building blocks for the Atlantis supervisor agents.
//!
//! ## Key Features
//! - Error taxonomy with the `AtlantisError` marker trait
//! - Layered configuration loading (defaults, TOML file, environment)
//! - Remote command execution over ssh
//! - Marker storage: a persisted set of names with an exclusive run lock

pub mod config;
pub mod error;
pub mod ssh;
pub mod storage;

pub use config::*;
pub use error::*;
pub use ssh::{RemoteExecutor, SshClientConfig, SshConnectionDetails, StandardSshClient};
pub use storage::{DirectoryLock, FsMarkerStore, MarkerStore, MemoryMarkerStore};
