//! Atlantis container monitor
//!
//! Runs the check_mk checks shipped inside each container over ssh and
//! relays their status lines, registering new services with the alerting
//! backend on the way.

pub mod alerting;
pub mod check;
pub mod cli;
pub mod config;
pub mod gc;
pub mod inventory;
pub mod runner;
pub mod status;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::MonitorConfig;
pub use runner::{MonitorRun, RunOutcome};
