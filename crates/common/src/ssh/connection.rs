//! SSH Connection Management
//!
//! Runs single commands on remote hosts through the system `ssh` client.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::RemoteCommandError;

/// SSH client configuration
#[derive(Debug, Clone)]
pub struct SshClientConfig {
    /// Path of the ssh binary
    pub ssh_binary: PathBuf,
    /// Connection timeout handed to ssh as `ConnectTimeout`
    pub connection_timeout: Duration,
}

impl Default for SshClientConfig {
    fn default() -> Self {
        Self {
            ssh_binary: PathBuf::from("ssh"),
            connection_timeout: Duration::from_secs(30),
        }
    }
}

/// SSH connection details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConnectionDetails {
    /// Target hostname or IP address
    pub host: String,
    /// SSH username
    pub username: String,
    /// SSH port
    pub port: u16,
    /// Path to private key file
    pub private_key_path: PathBuf,
}

impl SshConnectionDetails {
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

/// Executes a command on a remote host and returns its captured stdout.
///
/// Implementations never retry; a failed command is reported to the caller
/// as is.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(
        &self,
        details: &SshConnectionDetails,
        command: &str,
    ) -> Result<String, RemoteCommandError>;
}

/// Standard SSH client implementation
#[derive(Debug, Clone, Default)]
pub struct StandardSshClient {
    config: SshClientConfig,
}

impl StandardSshClient {
    /// Create a new SSH client with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new SSH client with custom configuration
    pub fn with_config(config: SshClientConfig) -> Self {
        Self { config }
    }

    /// Get client configuration
    pub fn config(&self) -> &SshClientConfig {
        &self.config
    }

    /// Arguments passed to ssh: quiet, no host key verification, explicit
    /// identity and port, then the remote command as a single argument.
    pub fn ssh_args(&self, details: &SshConnectionDetails, command: &str) -> Vec<String> {
        vec![
            "-q".to_string(),
            details.destination(),
            "-i".to_string(),
            details.private_key_path.display().to_string(),
            "-p".to_string(),
            details.port.to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!(
                "ConnectTimeout={}",
                self.config.connection_timeout.as_secs()
            ),
            command.to_string(),
        ]
    }

    /// Validate SSH connection details
    fn validate_connection_details(
        &self,
        details: &SshConnectionDetails,
    ) -> Result<(), RemoteCommandError> {
        if details.host.is_empty() {
            return Err(RemoteCommandError::InvalidDetails {
                reason: "host cannot be empty".to_string(),
            });
        }

        if details.username.is_empty() {
            return Err(RemoteCommandError::InvalidDetails {
                reason: "username cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl RemoteExecutor for StandardSshClient {
    async fn execute(
        &self,
        details: &SshConnectionDetails,
        command: &str,
    ) -> Result<String, RemoteCommandError> {
        self.validate_connection_details(details)?;

        let mut cmd = Command::new(&self.config.ssh_binary);
        cmd.args(self.ssh_args(details, command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the future (deadline expiry) terminates the ssh child.
            .kill_on_drop(true);

        debug!(
            host = %details.host,
            port = details.port,
            command = %command,
            "Executing SSH command"
        );

        let output = cmd
            .output()
            .await
            .map_err(|source| RemoteCommandError::Spawn { source })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                host = %details.host,
                status = %output.status,
                stderr = %stderr.trim(),
                "SSH command failed"
            );
            Err(RemoteCommandError::Failed {
                status: output.status.to_string(),
                stderr,
            })
        }
    }
}
