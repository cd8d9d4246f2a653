//! Test utilities for the monitor
//!
//! `ScriptedExecutor` stands in for ssh: every (host, command) pair is
//! answered from a table, optionally after a delay. `MockBackend` is the
//! mockall double of the alerting backend.

use async_trait::async_trait;
use common::error::RemoteCommandError;
use common::ssh::{RemoteExecutor, SshConnectionDetails};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::alerting::{AlertingBackend, AlertingError};

mockall::mock! {
    pub Backend {}

    #[async_trait]
    impl AlertingBackend for Backend {
        async fn register_service(&self, service: &str, contact_group: &str)
            -> Result<(), AlertingError>;
        async fn reinventory(&self) -> Result<(), AlertingError>;
    }
}

#[derive(Debug, Clone)]
struct ScriptedResponse {
    delay: Duration,
    result: Result<String, i32>,
}

#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    responses: HashMap<(String, String), ScriptedResponse>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` on `host` with `output` immediately
    pub fn respond(self, host: &str, command: &str, output: &str) -> Self {
        self.respond_after(host, command, Duration::ZERO, output)
    }

    /// Answer `command` on `host` with `output` after `delay`
    pub fn respond_after(
        mut self,
        host: &str,
        command: &str,
        delay: Duration,
        output: &str,
    ) -> Self {
        self.responses.insert(
            (host.to_string(), command.to_string()),
            ScriptedResponse {
                delay,
                result: Ok(output.to_string()),
            },
        );
        self
    }

    /// Fail `command` on `host` with exit status `code`
    pub fn fail(mut self, host: &str, command: &str, code: i32) -> Self {
        self.responses.insert(
            (host.to_string(), command.to_string()),
            ScriptedResponse {
                delay: Duration::ZERO,
                result: Err(code),
            },
        );
        self
    }

    /// Every (host, command) executed so far, in call order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of executed commands on `host` other than the discovery `ls`
    pub fn check_calls(&self, host: &str) -> usize {
        self.calls()
            .iter()
            .filter(|(h, cmd)| h == host && !cmd.starts_with("ls "))
            .count()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        details: &SshConnectionDetails,
        command: &str,
    ) -> Result<String, RemoteCommandError> {
        let key = (details.host.clone(), command.to_string());
        self.calls.lock().unwrap().push(key.clone());

        let Some(response) = self.responses.get(&key).cloned() else {
            return Err(RemoteCommandError::Failed {
                status: "exit status: 127".to_string(),
                stderr: format!("{command}: command not found"),
            });
        };

        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }

        response.result.map_err(|code| RemoteCommandError::Failed {
            status: format!("exit status: {code}"),
            stderr: String::new(),
        })
    }
}
