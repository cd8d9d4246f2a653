//! Configuration management for the container monitor

pub mod types;
pub mod validation;

pub use types::*;
