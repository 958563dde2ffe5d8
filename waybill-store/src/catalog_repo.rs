use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use waybill_catalog::{Carrier, CatalogError, CatalogSnapshot};
use waybill_core::{CarrierCatalog, PortError};

/// Carrier catalog held in memory.
///
/// Readers get the current snapshot; `replace` swaps in a new one without
/// disturbing optimizations already running against the old one.
pub struct InMemoryCarrierCatalog {
    snapshot: RwLock<Arc<CatalogSnapshot>>,
}

impl InMemoryCarrierCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogLoadError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogLoadError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        let snapshot = CatalogSnapshot::from_json(&json)?;
        info!("Loaded {} carriers from {}", snapshot.len(), path.display());
        Ok(Self::new(snapshot))
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.read().clone()
    }

    pub fn replace(&self, snapshot: CatalogSnapshot) {
        info!("Replacing carrier catalog ({} carriers)", snapshot.len());
        *self.snapshot.write() = Arc::new(snapshot);
    }
}

#[async_trait]
impl CarrierCatalog for InMemoryCarrierCatalog {
    async fn carriers_for_lane(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<Vec<Carrier>, PortError> {
        let snapshot = self.snapshot();
        Ok(snapshot
            .carriers_for_lane(origin, destination)
            .into_iter()
            .cloned()
            .collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogLoadError {
    #[error("Failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
