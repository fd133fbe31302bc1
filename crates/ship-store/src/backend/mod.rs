pub mod file;
pub mod memory;

use ship_core::{ShipResult, StoreConfig, WorkflowStore};
use std::sync::Arc;

/// Open the backend selected by `config`
pub async fn open_store(config: &StoreConfig) -> ShipResult<Arc<dyn WorkflowStore>> {
    match config {
        StoreConfig::Memory => {
            tracing::debug!("Using in-memory workflow store");
            Ok(Arc::new(memory::InMemoryStore::new()))
        }
        StoreConfig::File { path } => {
            tracing::debug!("Using file workflow store at {}", path.display());
            Ok(Arc::new(file::FileStore::open(path).await?))
        }
    }
}
