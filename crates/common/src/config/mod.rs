//! # Configuration Abstractions
//!
//! Layered configuration loading and the sections shared by all agents.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;
