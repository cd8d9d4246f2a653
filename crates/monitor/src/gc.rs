//! Removal of registration markers for containers that no longer exist

use common::error::PersistenceError;
use common::storage::MarkerStore;
use std::sync::Arc;
use tracing::{debug, info};

use crate::inventory::Inventory;

/// Container id a marker belongs to: its trailing `_`-delimited segment
pub fn marker_container_id(marker: &str) -> &str {
    marker.rsplit('_').next().unwrap_or(marker)
}

pub struct InventoryGc {
    markers: Arc<dyn MarkerStore>,
}

impl InventoryGc {
    pub fn new(markers: Arc<dyn MarkerStore>) -> Self {
        Self { markers }
    }

    /// Delete every marker whose container id is not in `inventory`.
    ///
    /// Returns the removed marker names. The first failed deletion stops the
    /// pass; markers removed before it stay removed.
    pub async fn collect(&self, inventory: &Inventory) -> Result<Vec<String>, PersistenceError> {
        let mut removed = Vec::new();

        for marker in self.markers.names().await? {
            let container_id = marker_container_id(&marker);
            if inventory.contains_key(container_id) {
                continue;
            }

            self.markers.remove(&marker).await?;
            debug!(marker = %marker, container_id = %container_id, "Removed obsolete marker");
            removed.push(marker);
        }

        if !removed.is_empty() {
            info!("Removed {} obsolete inventory markers", removed.len());
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Container;
    use async_trait::async_trait;
    use common::storage::MemoryMarkerStore;
    use std::sync::Mutex;

    fn inventory(ids: &[&str]) -> Inventory {
        ids.iter()
            .map(|id| {
                (
                    id.to_string(),
                    Container {
                        id: id.to_string(),
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_marker_container_id() {
        assert_eq!(marker_container_id("cpu_c1"), "c1");
        assert_eq!(marker_container_id("disk_usage_c1"), "c1");
        assert_eq!(marker_container_id("orphan"), "orphan");
    }

    #[tokio::test]
    async fn test_removes_exactly_markers_of_missing_containers() {
        let markers = Arc::new(MemoryMarkerStore::with_names([
            "cpu_c1", "mem_c1", "cpu_c2", "disk_usage_c3", "stray",
        ]));
        let gc = InventoryGc::new(markers.clone());

        let removed = gc.collect(&inventory(&["c1", "c3"])).await.unwrap();

        assert_eq!(removed, vec!["cpu_c2", "stray"]);
        assert_eq!(
            markers.names().await.unwrap(),
            vec!["cpu_c1", "disk_usage_c3", "mem_c1"]
        );
    }

    #[tokio::test]
    async fn test_empty_inventory_removes_everything() {
        let markers = Arc::new(MemoryMarkerStore::with_names(["cpu_c1", "mem_c2"]));
        let removed = InventoryGc::new(markers.clone())
            .collect(&Inventory::new())
            .await
            .unwrap();

        assert_eq!(removed.len(), 2);
        assert!(markers.names().await.unwrap().is_empty());
    }

    /// Fails to delete one chosen marker
    struct FailingStore {
        names: Mutex<Vec<String>>,
        poisoned: &'static str,
    }

    #[async_trait]
    impl MarkerStore for FailingStore {
        async fn contains(&self, name: &str) -> Result<bool, PersistenceError> {
            Ok(self.names.lock().unwrap().iter().any(|n| n == name))
        }

        async fn insert(&self, name: &str) -> Result<(), PersistenceError> {
            self.names.lock().unwrap().push(name.to_string());
            Ok(())
        }

        async fn remove(&self, name: &str) -> Result<(), PersistenceError> {
            if name == self.poisoned {
                return Err(PersistenceError::io(
                    name,
                    std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                ));
            }
            self.names.lock().unwrap().retain(|n| n != name);
            Ok(())
        }

        async fn names(&self) -> Result<Vec<String>, PersistenceError> {
            Ok(self.names.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn test_deletion_error_stops_walk_without_rollback() {
        let store = Arc::new(FailingStore {
            names: Mutex::new(vec![
                "a_gone1".to_string(),
                "b_gone2".to_string(),
                "c_gone3".to_string(),
            ]),
            poisoned: "b_gone2",
        });

        let result = InventoryGc::new(store.clone())
            .collect(&Inventory::new())
            .await;

        assert!(result.is_err());
        assert_eq!(store.names().await.unwrap(), vec!["b_gone2", "c_gone3"]);
    }
}
