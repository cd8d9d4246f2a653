//! CLI interface for the container monitor

pub mod args;

pub use args::{AppConfig, AppConfigResolver, ApplicationMode, ConfigFallback, MonitorArgs};
