//! One-time registration of services with the alerting backend
//!
//! A marker named after the service records that registration happened.

use common::error::PersistenceError;
use common::storage::MarkerStore;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::alerting::{AlertingBackend, AlertingError};

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error(transparent)]
    Marker(#[from] PersistenceError),

    #[error(transparent)]
    Backend(#[from] AlertingError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    AlreadyRegistered,
    Registered,
}

pub struct ContactRegistrar {
    alerting: Arc<dyn AlertingBackend>,
    markers: Arc<dyn MarkerStore>,
}

impl ContactRegistrar {
    pub fn new(alerting: Arc<dyn AlertingBackend>, markers: Arc<dyn MarkerStore>) -> Self {
        Self { alerting, markers }
    }

    /// Register `service` under `contact_group` unless its marker exists.
    ///
    /// A marker that cannot be written after a successful registration is
    /// only logged; the next run registers again.
    pub async fn ensure_registered(
        &self,
        service: &str,
        contact_group: &str,
    ) -> Result<Registration, RegistrationError> {
        if self.markers.contains(service).await? {
            return Ok(Registration::AlreadyRegistered);
        }

        self.alerting
            .register_service(service, contact_group)
            .await?;
        info!(
            service = %service,
            contact_group = %contact_group,
            "Registered service with alerting backend"
        );

        if let Err(e) = self.markers.insert(service).await {
            warn!(service = %service, error = %e, "Failed to record registration marker");
        }

        Ok(Registration::Registered)
    }
}
