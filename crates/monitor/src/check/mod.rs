//! Check execution
//!
//! A run fans out one [`ContainerCheck`] per container, and each container
//! fans out one [`ServiceCheck`] per discovered script.

pub mod container;
pub mod registrar;
pub mod service;

pub use container::{parse_listing, CheckAllReport, ContainerCheck, ContainerOutcome};
pub use registrar::{ContactRegistrar, Registration, RegistrationError};
pub use service::{ServiceCheck, GENERIC_ERROR_MESSAGE, TIMEOUT_MESSAGE};

use common::ssh::RemoteExecutor;
use std::path::PathBuf;
use std::sync::Arc;

use crate::status::StatusSink;

/// Run-scoped parameters shared by every container check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSettings {
    pub check_name: String,
    pub ssh_user: String,
    pub ssh_identity: PathBuf,
    /// Directory holding the check scripts inside each container
    pub check_dir: String,
}

/// Collaborators shared by every check of a run
#[derive(Clone)]
pub struct CheckContext {
    pub executor: Arc<dyn RemoteExecutor>,
    pub registrar: Arc<ContactRegistrar>,
    pub sink: Arc<dyn StatusSink>,
}
