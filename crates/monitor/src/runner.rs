//! One monitoring pass over the container inventory
//!
//! Load the inventory, check every container concurrently, ask the alerting
//! backend to re-inventory, then drop markers of vanished containers.
//! The marker directory lock keeps overlapping passes from racing on markers.

use common::error::PersistenceError;
use common::ssh::{RemoteExecutor, StandardSshClient};
use common::storage::FsMarkerStore;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::alerting::{AlertingBackend, CmkAdmin};
use crate::check::{CheckContext, ContactRegistrar, ContainerCheck, ContainerOutcome};
use crate::config::MonitorConfig;
use crate::gc::InventoryGc;
use crate::inventory::{retrieve_inventory, Inventory};
use crate::status::{StatusLine, StatusSink, StdoutSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The inventory file does not exist yet
    NoInventory,
    /// The inventory file exists but could not be read or decoded
    InventoryUnreadable,
    /// Another pass holds the marker directory lock
    Busy,
    Completed {
        containers: usize,
        markers_removed: usize,
    },
}

pub struct MonitorRun {
    config: MonitorConfig,
    executor: Arc<dyn RemoteExecutor>,
    alerting: Arc<dyn AlertingBackend>,
    markers: Arc<FsMarkerStore>,
    sink: Arc<dyn StatusSink>,
}

impl MonitorRun {
    pub fn new(
        config: MonitorConfig,
        executor: Arc<dyn RemoteExecutor>,
        alerting: Arc<dyn AlertingBackend>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        let markers = Arc::new(FsMarkerStore::new(&config.inventory_dir));
        Self {
            config,
            executor,
            alerting,
            markers,
            sink,
        }
    }

    /// Production wiring: system ssh, `cmk_admin`, stdout.
    pub fn from_config(config: MonitorConfig) -> Self {
        let alerting = Arc::new(CmkAdmin::new(&config.cmk_admin));
        Self::new(
            config,
            Arc::new(StandardSshClient::new()),
            alerting,
            Arc::new(StdoutSink),
        )
    }

    fn report(&self, line: StatusLine) {
        self.sink.emit(&line);
    }

    pub async fn execute(&self) -> RunOutcome {
        let check_name = &self.config.check_name;
        let path = &self.config.container_file;

        let inventory = match retrieve_inventory(path).await {
            Ok(inventory) => inventory,
            Err(e) if e.is_not_found() => {
                self.report(StatusLine::ok(
                    check_name,
                    format!("Directory does not exists {}", path.display()),
                ));
                return RunOutcome::NoInventory;
            }
            Err(e) => {
                error!("Failed to load inventory {}: {}", path.display(), e);
                self.report(StatusLine::critical(
                    check_name,
                    format!("Could not retrieve {}: {}", path.display(), e),
                ));
                return RunOutcome::InventoryUnreadable;
            }
        };
        self.report(StatusLine::ok(
            check_name,
            format!("Able to open {}", path.display()),
        ));

        let _lock = match self.markers.try_lock() {
            Ok(lock) => Some(lock),
            Err(PersistenceError::Locked { .. }) => {
                self.report(StatusLine::warning(
                    check_name,
                    format!(
                        "Another monitor run holds the inventory lock {}",
                        self.markers.dir().display()
                    ),
                ));
                return RunOutcome::Busy;
            }
            Err(e) => {
                warn!("Failed to lock inventory directory ({}), proceeding without lock", e);
                None
            }
        };

        let containers = self.check_containers(&inventory).await;

        if let Err(e) = self.alerting.reinventory().await {
            warn!("Alerting backend re-inventory failed: {}", e);
        }

        let markers_removed = match InventoryGc::new(self.markers.clone())
            .collect(&inventory)
            .await
        {
            Ok(removed) => removed.len(),
            Err(e) => {
                error!("Inventory cleanup failed: {}", e);
                self.sink.emit_raw(&format!(
                    "Error iterating over inventory to delete obsolete markers. Error:\n{e}"
                ));
                0
            }
        };

        info!(containers, markers_removed, "Monitoring pass finished");
        RunOutcome::Completed {
            containers,
            markers_removed,
        }
    }

    /// Run every container's checks concurrently; returns how many finished.
    async fn check_containers(&self, inventory: &Inventory) -> usize {
        let settings = Arc::new(self.config.check_settings());
        let ctx = CheckContext {
            executor: self.executor.clone(),
            registrar: Arc::new(ContactRegistrar::new(
                self.alerting.clone(),
                self.markers.clone(),
            )),
            sink: self.sink.clone(),
        };
        let timeout = self.config.timeout();

        let workers: Vec<_> = inventory
            .values()
            .cloned()
            .map(|container| {
                let check = ContainerCheck::new(container, settings.clone(), ctx.clone());
                tokio::spawn(async move { check.run(timeout).await })
            })
            .collect();

        let mut finished = 0;
        for result in join_all(workers).await {
            finished += 1;
            match result {
                Ok(ContainerOutcome::Checked(report)) if report.aborted => {
                    warn!("Container checks stopped early after a registration failure")
                }
                Ok(_) => {}
                Err(e) => error!("Container check task failed: {}", e),
            }
        }
        finished
    }
}
