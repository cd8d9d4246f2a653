//! Container inventory persisted by the supervisor
//!
//! The inventory is a JSON object mapping container id to container record.

pub mod types;

pub use types::*;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("{} does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("{source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl InventoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, InventoryError::NotFound { .. })
    }
}

/// Read and decode the inventory at `path`.
pub async fn retrieve_inventory(path: &Path) -> Result<Inventory, InventoryError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            InventoryError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            InventoryError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let inventory: Inventory =
        serde_json::from_slice(&bytes).map_err(|source| InventoryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(
        "Loaded {} containers from {}",
        inventory.len(),
        path.display()
    );
    Ok(inventory)
}
