//! Alerting backend administration
//!
//! New services are registered under a contact group before their first
//! report, and the backend is asked to re-inventory once per run.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug)]
pub enum AlertingError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

#[async_trait]
pub trait AlertingBackend: Send + Sync {
    /// Register `service` so its notifications route to `contact_group`.
    async fn register_service(&self, service: &str, contact_group: &str)
        -> Result<(), AlertingError>;

    /// Ask the backend to rediscover services.
    async fn reinventory(&self) -> Result<(), AlertingError>;
}

/// check_mk administration through the `cmk_admin` helper
#[derive(Debug, Clone)]
pub struct CmkAdmin {
    binary: PathBuf,
}

impl CmkAdmin {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<(), AlertingError> {
        let program = self.binary.display().to_string();
        debug!(program = %program, ?args, "Running alerting admin command");

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| AlertingError::Spawn {
                program: program.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(AlertingError::Failed {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl AlertingBackend for CmkAdmin {
    async fn register_service(
        &self,
        service: &str,
        contact_group: &str,
    ) -> Result<(), AlertingError> {
        self.run(&["-s", service, "-a", contact_group]).await
    }

    async fn reinventory(&self) -> Result<(), AlertingError> {
        self.run(&["-I"]).await
    }
}
