//! Monitor configuration

use common::config::{loader, LoadOptions, LoggingConfig};
use common::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::check::CheckSettings;

/// Config file read when no other path is given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/atlantis/supervisor/monitor.toml";

/// Environment variable prefix, e.g. `ATLANTIS_MONITOR_SSH_USER`
pub const ENV_PREFIX: &str = "ATLANTIS_MONITOR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Persisted container inventory written by the supervisor
    pub container_file: PathBuf,

    /// Directory of alerting registration markers
    pub inventory_dir: PathBuf,

    /// Private key used for every container; a leading `~` is expanded
    pub ssh_identity: String,

    pub ssh_user: String,

    /// Name under which the monitor reports about itself
    pub check_name: String,

    /// Directory of check scripts inside each container
    pub check_dir: String,

    /// Per-check deadline in seconds
    pub timeout_duration: u64,

    /// Alerting backend admin helper
    pub cmk_admin: PathBuf,

    pub logging: LoggingConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            container_file: PathBuf::from("/etc/atlantis/supervisor/save/containers"),
            inventory_dir: PathBuf::from("/etc/atlantis/supervisor/inventory"),
            ssh_identity: "/opt/atlantis/supervisor/master_id_rsa".to_string(),
            ssh_user: "root".to_string(),
            check_name: "ContainerMonitor".to_string(),
            check_dir: "/check_mk_checks".to_string(),
            timeout_duration: 110,
            cmk_admin: PathBuf::from("/usr/bin/cmk_admin"),
            logging: LoggingConfig {
                level: "warn".to_string(),
                ..Default::default()
            },
        }
    }
}

impl MonitorConfig {
    /// Load defaults, then `path` if it exists, then `ATLANTIS_MONITOR_*`.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        loader::load_config_with_options(LoadOptions {
            config_path: Some(path.to_path_buf()),
            env_prefix: ENV_PREFIX.to_string(),
            require_file: false,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_duration)
    }

    /// Identity path with a leading `~` replaced by the home directory
    pub fn ssh_identity_path(&self) -> PathBuf {
        expand_home(&self.ssh_identity, dirs::home_dir())
    }

    pub fn check_settings(&self) -> CheckSettings {
        CheckSettings {
            check_name: self.check_name.clone(),
            ssh_user: self.ssh_user.clone(),
            ssh_identity: self.ssh_identity_path(),
            check_dir: normalize_check_dir(&self.check_dir),
        }
    }
}

/// Strip trailing slashes, keeping the root directory itself.
fn normalize_check_dir(dir: &str) -> String {
    match dir.trim_end_matches('/') {
        "" if dir.starts_with('/') => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

fn expand_home(path: &str, home: Option<PathBuf>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) => {
            PathBuf::from(format!("{}{}", home.display(), rest))
        }
        _ => PathBuf::from(path),
    }
}
