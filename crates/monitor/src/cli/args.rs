//! CLI argument parsing and application configuration
//!
//! Flags mirror the config file keys; a non-empty (or non-zero) flag wins
//! over the file.

use anyhow::Result;
use clap::Parser;
use common::error::ConfigurationError;
use std::fmt;
use std::path::PathBuf;

use crate::config::{MonitorConfig, DEFAULT_CONFIG_PATH};

/// Main application arguments
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct MonitorArgs {
    /// File to get containers information from
    #[arg(short = 'f', long)]
    pub container_file: Option<PathBuf>,

    /// File containing the SSH key for all containers
    #[arg(short = 'i', long)]
    pub ssh_identity: Option<String>,

    /// User account to ssh into containers
    #[arg(short = 'u', long)]
    pub ssh_user: Option<String>,

    /// Service name that will appear in Nagios for the monitor
    #[arg(short = 'n', long)]
    pub check_name: Option<String>,

    /// Directory containing all the scripts for the monitoring checks
    #[arg(short = 'd', long)]
    pub check_dir: Option<String>,

    /// Max number of seconds to wait for a monitoring check to finish
    #[arg(short = 't', long)]
    pub timeout_duration: Option<u64>,

    /// Directory of alerting registration markers
    #[arg(long)]
    pub inventory_dir: Option<PathBuf>,

    /// The config file to use
    #[arg(short = 'c', long = "config-file", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Write the default configuration to the config file path and exit
    #[arg(long)]
    pub gen_config: bool,
}

fn non_empty(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|v| !v.is_empty())
}

impl MonitorArgs {
    /// Parse arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the application mode based on arguments
    pub fn get_mode(&self) -> ApplicationMode {
        if self.gen_config {
            ApplicationMode::GenerateConfig
        } else {
            ApplicationMode::Run
        }
    }

    /// Overlay flags that were given on top of `config`.
    pub fn apply_overrides(&self, config: &mut MonitorConfig) {
        if let Some(path) = self.container_file.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            config.container_file = path.clone();
        }
        if let Some(path) = self.inventory_dir.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            config.inventory_dir = path.clone();
        }
        if let Some(identity) = non_empty(&self.ssh_identity) {
            config.ssh_identity = identity.clone();
        }
        if let Some(user) = non_empty(&self.ssh_user) {
            config.ssh_user = user.clone();
        }
        if let Some(dir) = non_empty(&self.check_dir) {
            config.check_dir = dir.clone();
        }
        if let Some(name) = non_empty(&self.check_name) {
            config.check_name = name.clone();
        }
        if let Some(timeout) = self.timeout_duration.filter(|t| *t != 0) {
            config.timeout_duration = timeout;
        }
        if let Some(level) = non_empty(&self.log_level) {
            config.logging.level = level.clone();
        }
    }

    /// Config file, then flags.
    ///
    /// A missing, unreadable or malformed file falls back to the defaults:
    /// the monitor must still report even when its configuration is broken.
    /// The fallback is returned so it can be logged once logging is up.
    pub fn resolve_config(&self) -> (MonitorConfig, Option<ConfigFallback>) {
        let missing = !self.config.exists();
        let (mut config, fallback) = match MonitorConfig::load(&self.config) {
            Ok(config) if missing => (
                config,
                Some(ConfigFallback::Missing {
                    path: self.config.clone(),
                }),
            ),
            Ok(config) => (config, None),
            Err(error) => (
                MonitorConfig::default(),
                Some(ConfigFallback::Unusable {
                    path: self.config.clone(),
                    error,
                }),
            ),
        };
        self.apply_overrides(&mut config);
        (config, fallback)
    }
}

/// Why the configuration file did not contribute to the configuration
#[derive(Debug)]
pub enum ConfigFallback {
    Missing {
        path: PathBuf,
    },
    Unusable {
        path: PathBuf,
        error: ConfigurationError,
    },
}

impl fmt::Display for ConfigFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFallback::Missing { path } => write!(
                f,
                "Configuration file {} not found, using defaults",
                path.display()
            ),
            ConfigFallback::Unusable { path, error } => write!(
                f,
                "Ignoring configuration file {}: {}",
                path.display(),
                error
            ),
        }
    }
}

/// Application operating mode
#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationMode {
    /// Generate configuration file and exit
    GenerateConfig,
    /// Run one monitoring pass and exit
    Run,
}

/// Unified application configuration
#[derive(Debug)]
pub enum AppConfig {
    /// Configuration file generation mode
    ConfigGeneration { output_path: PathBuf },
    /// Monitoring pass
    Run {
        config: MonitorConfig,
        fallback: Option<ConfigFallback>,
    },
}

/// Application configuration resolver
pub struct AppConfigResolver;

impl AppConfigResolver {
    /// Resolve application configuration from arguments
    pub fn resolve(args: &MonitorArgs) -> Result<AppConfig> {
        match args.get_mode() {
            ApplicationMode::GenerateConfig => Ok(AppConfig::ConfigGeneration {
                output_path: args.config.clone(),
            }),
            ApplicationMode::Run => {
                let (config, fallback) = args.resolve_config();
                Ok(AppConfig::Run { config, fallback })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_short_flags() {
        let args = MonitorArgs::try_parse_from([
            "container-monitor",
            "-f",
            "/tmp/containers",
            "-u",
            "deploy",
            "-t",
            "30",
            "-c",
            "/tmp/monitor.toml",
        ])
        .unwrap();

        assert_eq!(args.container_file, Some(PathBuf::from("/tmp/containers")));
        assert_eq!(args.ssh_user.as_deref(), Some("deploy"));
        assert_eq!(args.timeout_duration, Some(30));
        assert_eq!(args.config, PathBuf::from("/tmp/monitor.toml"));
        assert_eq!(args.get_mode(), ApplicationMode::Run);
    }

    #[test]
    fn test_config_file_default() {
        let args = MonitorArgs::try_parse_from(["container-monitor"]).unwrap();
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_empty_and_zero_flags_do_not_override() {
        let mut config = MonitorConfig::default();
        let args = MonitorArgs {
            ssh_user: Some(String::new()),
            timeout_duration: Some(0),
            check_name: Some("EdgeMonitor".to_string()),
            ..Default::default()
        };

        args.apply_overrides(&mut config);

        assert_eq!(config.ssh_user, "root");
        assert_eq!(config.timeout_duration, 110);
        assert_eq!(config.check_name, "EdgeMonitor");
    }

    #[test]
    #[serial]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        std::io::Write::write_all(
            &mut file,
            b"ssh_user = \"atlantis\"\ncheck_dir = \"/opt/checks\"\ntimeout_duration = 60\n",
        )
        .unwrap();

        let args = MonitorArgs {
            config: file.path().to_path_buf(),
            timeout_duration: Some(15),
            ..Default::default()
        };
        let (config, fallback) = args.resolve_config();

        assert_eq!(config.ssh_user, "atlantis");
        assert_eq!(config.check_dir, "/opt/checks");
        assert_eq!(config.timeout_duration, 15);
        assert!(fallback.is_none());
    }

    #[test]
    #[serial]
    fn test_malformed_file_falls_back_to_defaults() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        std::io::Write::write_all(&mut file, b"timeout_duration = \"soon\"").unwrap();

        let args = MonitorArgs {
            config: file.path().to_path_buf(),
            ..Default::default()
        };

        let (config, fallback) = args.resolve_config();
        assert_eq!(config, MonitorConfig::default());
        match fallback {
            Some(fallback @ ConfigFallback::Unusable { .. }) => {
                assert!(fallback
                    .to_string()
                    .starts_with(&format!("Ignoring configuration file {}", file.path().display())));
            }
            other => panic!("Expected Unusable fallback, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        let args = MonitorArgs {
            config: path.clone(),
            ssh_user: Some("deploy".to_string()),
            ..Default::default()
        };

        match AppConfigResolver::resolve(&args).unwrap() {
            AppConfig::Run {
                config,
                fallback: Some(fallback @ ConfigFallback::Missing { .. }),
            } => {
                assert_eq!(config.ssh_user, "deploy");
                assert_eq!(
                    fallback.to_string(),
                    format!("Configuration file {} not found, using defaults", path.display())
                );
            }
            other => panic!("Expected Run with Missing fallback, got {other:?}"),
        }
    }

    #[test]
    fn test_gen_config_mode() {
        let args = MonitorArgs {
            gen_config: true,
            config: PathBuf::from("/tmp/out.toml"),
            ..Default::default()
        };
        match AppConfigResolver::resolve(&args).unwrap() {
            AppConfig::ConfigGeneration { output_path } => {
                assert_eq!(output_path, PathBuf::from("/tmp/out.toml"))
            }
            other => panic!("Expected ConfigGeneration, got {other:?}"),
        }
    }
}
