//! Per-container check run: discovery, registration and fan-out

use common::ssh::SshConnectionDetails;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{CheckContext, CheckSettings, ServiceCheck};
use crate::inventory::Container;
use crate::status::StatusLine;

/// What a container run did, for logging and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerOutcome {
    /// Listing the check directory failed
    DiscoveryFailed,
    /// The check directory is empty
    NoChecks,
    /// Checks were spawned
    Checked(CheckAllReport),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckAllReport {
    /// Scripts discovered on the container
    pub scripts: usize,
    /// Check workers spawned
    pub spawned: usize,
    /// Services registered with the alerting backend during this run
    pub registered: usize,
    /// A registration failure stopped the script loop
    pub aborted: bool,
}

pub struct ContainerCheck {
    /// Name of the container-level report, `<check name>_<container id>`
    pub name: String,
    container: Container,
    settings: Arc<CheckSettings>,
    ctx: CheckContext,
}

impl ContainerCheck {
    pub fn new(container: Container, settings: Arc<CheckSettings>, ctx: CheckContext) -> Self {
        Self {
            name: format!("{}_{}", settings.check_name, container.id),
            container,
            settings,
            ctx,
        }
    }

    fn connection(&self) -> SshConnectionDetails {
        SshConnectionDetails {
            host: self.container.ssh_host().to_string(),
            username: self.settings.ssh_user.clone(),
            port: self.container.ssh_port,
            private_key_path: self.settings.ssh_identity.clone(),
        }
    }

    /// Discover the container's check scripts and run them all.
    pub async fn run(&self, timeout: Duration) -> ContainerOutcome {
        let listing = match self
            .ctx
            .executor
            .execute(&self.connection(), &format!("ls {}", self.settings.check_dir))
            .await
        {
            Ok(listing) => listing,
            Err(e) => {
                error!(container_id = %self.container.id, error = %e, "Check discovery failed");
                self.ctx.sink.emit(&StatusLine::critical(
                    &self.name,
                    format!("Error getting checks for container:\n{e}"),
                ));
                return ContainerOutcome::DiscoveryFailed;
            }
        };

        let scripts = parse_listing(&listing);
        if scripts.is_empty() {
            debug!(container_id = %self.container.id, "No checks on container");
            return ContainerOutcome::NoChecks;
        }

        self.ctx
            .sink
            .emit(&StatusLine::ok(&self.name, "Got checks for container"));
        ContainerOutcome::Checked(self.check_all(&scripts, timeout).await)
    }

    /// Register unseen services and spawn one timed check per script.
    ///
    /// A registration failure stops the loop: later scripts are neither
    /// registered nor checked, while checks already spawned still report.
    pub async fn check_all(&self, scripts: &[String], timeout: Duration) -> CheckAllReport {
        let contact_group = self.container.contact_group();
        let mut report = CheckAllReport {
            scripts: scripts.len(),
            ..Default::default()
        };
        let mut workers = Vec::with_capacity(scripts.len());

        for script in scripts {
            let service = self.container.service_name(script);

            match self
                .ctx
                .registrar
                .ensure_registered(&service, contact_group)
                .await
            {
                Ok(super::Registration::Registered) => report.registered += 1,
                Ok(super::Registration::AlreadyRegistered) => {}
                Err(e) => {
                    error!(service = %service, error = %e, "Service registration failed");
                    self.ctx.sink.emit_raw(&format!(
                        "Failure to update contact group for service {service}. Error:\n{e}"
                    ));
                    report.aborted = true;
                    break;
                }
            }

            let check = self.service_check(script);
            let executor = self.ctx.executor.clone();
            let sink = self.ctx.sink.clone();
            workers.push(tokio::spawn(async move {
                check
                    .check_with_timeout(executor.as_ref(), sink.as_ref(), timeout)
                    .await
            }));
        }

        report.spawned = workers.len();
        for result in join_all(workers).await {
            if let Err(e) = result {
                warn!(container_id = %self.container.id, "Check worker failed: {}", e);
            }
        }

        info!(
            container_id = %self.container.id,
            scripts = report.scripts,
            spawned = report.spawned,
            registered = report.registered,
            "Container checks finished"
        );
        report
    }

    /// Build the check for `script`: `<check dir>/<script> <primary port> <id>`.
    pub fn service_check(&self, script: &str) -> ServiceCheck {
        let dir = self.settings.check_dir.trim_end_matches('/');
        let command = format!(
            "{}/{} {} {}",
            dir, script, self.container.primary_port, self.container.id
        );
        ServiceCheck::new(
            self.container.service_name(script),
            self.connection(),
            command,
        )
    }
}

/// Script names from `ls` output, one per non-blank line
pub fn parse_listing(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::AlertingError;
    use crate::check::ContactRegistrar;
    use crate::status::MemorySink;
    use crate::test_utils::{MockBackend, ScriptedExecutor};
    use common::storage::{MarkerStore, MemoryMarkerStore};
    use std::path::PathBuf;

    fn settings_in(check_dir: &str) -> Arc<CheckSettings> {
        Arc::new(CheckSettings {
            check_name: "ContainerMonitor".to_string(),
            ssh_user: "root".to_string(),
            ssh_identity: PathBuf::from("/id_rsa"),
            check_dir: check_dir.to_string(),
        })
    }

    fn settings() -> Arc<CheckSettings> {
        settings_in("/check_mk_checks")
    }

    fn container() -> Container {
        Container {
            id: "c1".to_string(),
            host: "h1".to_string(),
            ssh_port: 22,
            primary_port: 8080,
            ..Default::default()
        }
    }

    fn context(
        executor: ScriptedExecutor,
        backend: MockBackend,
        markers: Arc<MemoryMarkerStore>,
        sink: Arc<MemorySink>,
    ) -> (CheckContext, Arc<ScriptedExecutor>) {
        let executor = Arc::new(executor);
        let ctx = CheckContext {
            executor: executor.clone(),
            registrar: Arc::new(ContactRegistrar::new(Arc::new(backend), markers)),
            sink,
        };
        (ctx, executor)
    }

    #[test]
    fn test_parse_listing() {
        assert_eq!(parse_listing("cpu.sh\nmem.sh\n"), vec!["cpu.sh", "mem.sh"]);
        assert_eq!(parse_listing("  \n"), Vec::<String>::new());
        assert_eq!(parse_listing("a.sh\n\nb.sh"), vec!["a.sh", "b.sh"]);
    }

    #[test]
    fn test_service_check_command() {
        let (ctx, _) = context(
            ScriptedExecutor::new(),
            MockBackend::new(),
            Arc::new(MemoryMarkerStore::new()),
            Arc::new(MemorySink::new()),
        );
        let check = ContainerCheck::new(container(), settings(), ctx);
        let service = check.service_check("cpu.sh");

        assert_eq!(service.service, "cpu_c1");
        assert_eq!(service.script, "/check_mk_checks/cpu.sh 8080 c1");
        assert_eq!(service.connection.host, "h1");
        assert_eq!(service.connection.port, 22);
        assert_eq!(check.name, "ContainerMonitor_c1");
    }

    #[tokio::test]
    async fn test_root_check_dir_lists_root() {
        let sink = Arc::new(MemorySink::new());
        let (ctx, executor) = context(
            ScriptedExecutor::new().respond("h1", "ls /", "\n"),
            MockBackend::new(),
            Arc::new(MemoryMarkerStore::new()),
            sink.clone(),
        );
        let check = ContainerCheck::new(container(), settings_in("/"), ctx);

        assert_eq!(check.run(Duration::from_secs(5)).await, ContainerOutcome::NoChecks);
        assert_eq!(
            executor.calls(),
            vec![("h1".to_string(), "ls /".to_string())]
        );
        assert_eq!(check.service_check("cpu.sh").script, "/cpu.sh 8080 c1");
    }

    #[tokio::test]
    async fn test_empty_discovery_emits_nothing() {
        let sink = Arc::new(MemorySink::new());
        let (ctx, executor) = context(
            ScriptedExecutor::new().respond("h1", "ls /check_mk_checks", "\n"),
            MockBackend::new(),
            Arc::new(MemoryMarkerStore::new()),
            sink.clone(),
        );

        let outcome = ContainerCheck::new(container(), settings(), ctx)
            .run(Duration::from_secs(5))
            .await;

        assert_eq!(outcome, ContainerOutcome::NoChecks);
        assert!(sink.lines().is_empty());
        assert_eq!(executor.check_calls("h1"), 0);
    }

    #[tokio::test]
    async fn test_discovery_failure_reports_container() {
        let sink = Arc::new(MemorySink::new());
        let (ctx, executor) = context(
            ScriptedExecutor::new().fail("h1", "ls /check_mk_checks", 255),
            MockBackend::new(),
            Arc::new(MemoryMarkerStore::new()),
            sink.clone(),
        );

        let outcome = ContainerCheck::new(container(), settings(), ctx)
            .run(Duration::from_secs(5))
            .await;

        assert_eq!(outcome, ContainerOutcome::DiscoveryFailed);
        assert_eq!(
            sink.lines(),
            vec!["2 ContainerMonitor_c1 - Error getting checks for container:\nexit status: 255"]
        );
        assert_eq!(executor.check_calls("h1"), 0);
    }

    #[tokio::test]
    async fn test_check_all_registers_each_service_once() {
        let mut backend = MockBackend::new();
        backend
            .expect_register_service()
            .times(2)
            .returning(|_, _| Ok(()));
        let markers = Arc::new(MemoryMarkerStore::new());
        let sink = Arc::new(MemorySink::new());
        let executor = ScriptedExecutor::new()
            .respond("h1", "/check_mk_checks/cpu.sh 8080 c1", "0 cpu_c1 - ok\n")
            .respond("h1", "/check_mk_checks/mem.sh 8080 c1", "0 mem_c1 - ok\n");
        let (ctx, _) = context(executor, backend, markers.clone(), sink.clone());
        let check = ContainerCheck::new(container(), settings(), ctx);
        let scripts = vec!["cpu.sh".to_string(), "mem.sh".to_string()];

        let first = check.check_all(&scripts, Duration::from_secs(5)).await;
        let second = check.check_all(&scripts, Duration::from_secs(5)).await;

        assert_eq!(first.registered, 2);
        assert_eq!(second.registered, 0);
        assert_eq!(second.spawned, 2);
        assert_eq!(markers.names().await.unwrap(), vec!["cpu_c1", "mem_c1"]);
        assert_eq!(sink.lines_for("cpu_c1").len(), 2);
    }

    #[tokio::test]
    async fn test_registration_failure_aborts_remaining_scripts() {
        let mut backend = MockBackend::new();
        backend
            .expect_register_service()
            .times(1)
            .returning(|_, _| {
                Err(AlertingError::Failed {
                    program: "cmk_admin".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: String::new(),
                })
            });
        // cpu_c1 is already registered, mem_c1 fails, disk_c1 is never reached
        let markers = Arc::new(MemoryMarkerStore::with_names(["cpu_c1"]));
        let sink = Arc::new(MemorySink::new());
        let executor = ScriptedExecutor::new()
            .respond("h1", "/check_mk_checks/cpu.sh 8080 c1", "0 cpu_c1 - ok\n")
            .respond("h1", "/check_mk_checks/disk.sh 8080 c1", "0 disk_c1 - ok\n");
        let (ctx, executor) = context(executor, backend, markers, sink.clone());
        let check = ContainerCheck::new(container(), settings(), ctx);
        let scripts = vec![
            "cpu.sh".to_string(),
            "mem.sh".to_string(),
            "disk.sh".to_string(),
        ];

        let report = check.check_all(&scripts, Duration::from_secs(5)).await;

        assert!(report.aborted);
        assert_eq!(report.spawned, 1);
        assert_eq!(sink.lines_for("cpu_c1"), vec!["0 cpu_c1 - ok"]);
        assert!(sink.lines_for("disk_c1").is_empty());
        assert!(sink
            .lines()
            .iter()
            .any(|line| line.starts_with("Failure to update contact group for service mem_c1")));
        assert_eq!(executor.check_calls("h1"), 1);
    }
}
