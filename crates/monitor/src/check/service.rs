//! A single check script run against one container

use common::ssh::{RemoteExecutor, SshConnectionDetails};
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, warn};

use crate::status::{StatusLine, StatusSink};

/// Message reported when a check misses its deadline
pub const TIMEOUT_MESSAGE: &str = "Timeout occured during check";

/// Message reported when a script's output does not belong to its service
pub const GENERIC_ERROR_MESSAGE: &str = "Error encountered while monitoring the service";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCheck {
    /// Service name the script must report under
    pub service: String,
    pub connection: SshConnectionDetails,
    /// Full remote command line
    pub script: String,
}

impl ServiceCheck {
    pub fn new(
        service: impl Into<String>,
        connection: SshConnectionDetails,
        script: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            connection,
            script: script.into(),
        }
    }

    pub fn timeout_line(&self) -> StatusLine {
        StatusLine::critical(&self.service, TIMEOUT_MESSAGE)
    }

    pub fn error_line(&self, err: Option<&dyn Display>) -> StatusLine {
        match err {
            Some(err) => StatusLine::critical(&self.service, err.to_string()),
            None => StatusLine::critical(&self.service, GENERIC_ERROR_MESSAGE),
        }
    }

    /// Pass `output` through when its second token names this service,
    /// otherwise replace it with the generic critical line.
    pub fn validate(&self, output: &str) -> String {
        if output.split_whitespace().nth(1) == Some(self.service.as_str()) {
            return output.to_string();
        }

        warn!(
            service = %self.service,
            output = %output.trim(),
            "Check output does not name its service, reporting generic error"
        );
        self.error_line(None).render()
    }

    /// Run the script and return the text to report.
    pub async fn run(&self, executor: &dyn RemoteExecutor) -> String {
        match executor.execute(&self.connection, &self.script).await {
            Ok(output) => self.validate(&output),
            Err(e) => {
                debug!(service = %self.service, error = %e, "Check command failed");
                self.error_line(Some(&e)).render()
            }
        }
    }

    /// Run the script, reporting either its result or the timeout line,
    /// whichever comes first.
    ///
    /// On expiry the in-flight run is dropped, which kills the local ssh
    /// child; the timeout line is emitted immediately.
    pub async fn check_with_timeout(
        &self,
        executor: &dyn RemoteExecutor,
        sink: &dyn StatusSink,
        deadline: Duration,
    ) {
        match tokio::time::timeout(deadline, self.run(executor)).await {
            Ok(report) => sink.emit_raw(&report),
            Err(_) => {
                warn!(
                    service = %self.service,
                    deadline_secs = deadline.as_secs(),
                    "Check timed out"
                );
                sink.emit(&self.timeout_line());
            }
        }
    }
}
