//! File-based workflow store
//!
//! Keeps every record in a JSON object keyed by workflow id. The whole file is
//! rewritten after each mutation, so workflow history survives a restart.

use async_trait::async_trait;
use ship_core::{
    Mutation, ShipError, ShipResult, Workflow, WorkflowFilter, WorkflowStatus, WorkflowStore,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

const INTERRUPTED: &str = "orchestrator restarted while running";

/// File-backed workflow store
///
/// Reads are served from an in-memory cache. Writers hold the cache lock
/// until the file has been replaced, so the file always reflects a prefix of
/// the mutation order.
///
/// ## Example
///
/// ```rust,no_run
/// use ship_store::FileStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FileStore::open("./workflows.json").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    cache: Arc<RwLock<HashMap<String, Workflow>>>,
}

impl FileStore {
    /// Open the store at `path`, loading any existing records
    ///
    /// Records left `running` by a previous process can never finish, so
    /// they are marked failed on load.
    pub async fn open(path: impl Into<PathBuf>) -> ShipResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ShipError::store(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let mut cache = Self::load(&path).await?;
        let mut orphaned = 0usize;
        for workflow in cache.values_mut() {
            // Steps are closed even on cancelled records whose stage was in flight
            let closed = workflow.fail_open_steps(INTERRUPTED);
            if workflow.finish(WorkflowStatus::Failed, INTERRUPTED) || closed > 0 {
                orphaned += 1;
            }
        }

        let store = Self {
            path,
            cache: Arc::new(RwLock::new(cache)),
        };

        if orphaned > 0 {
            tracing::warn!(
                "Marked {} interrupted workflow(s) as failed in {}",
                orphaned,
                store.path.display()
            );
            let cache = store.cache.read().await;
            store.persist(&cache).await?;
        }

        Ok(store)
    }

    async fn load(path: &Path) -> ShipResult<HashMap<String, Workflow>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ShipError::store(format!("Failed to read store file {}: {}", path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            ShipError::store(format!("Failed to parse store file {}: {}", path.display(), e))
        })
    }

    // Write to a sibling temp file and rename over the target.
    async fn persist(&self, cache: &HashMap<String, Workflow>) -> ShipResult<()> {
        let content = serde_json::to_string_pretty(cache)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, content).await.map_err(|e| {
            ShipError::store(format!("Failed to write store file {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            ShipError::store(format!(
                "Failed to replace store file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WorkflowStore for FileStore {
    async fn insert(&self, workflow: Workflow) -> ShipResult<()> {
        let mut cache = self.cache.write().await;
        if cache.contains_key(&workflow.id) {
            return Err(ShipError::store(format!(
                "workflow '{}' already exists",
                workflow.id
            )));
        }
        let id = workflow.id.clone();
        cache.insert(id.clone(), workflow);
        if let Err(e) = self.persist(&cache).await {
            cache.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> ShipResult<Option<Workflow>> {
        Ok(self.cache.read().await.get(id).cloned())
    }

    async fn update(&self, id: &str, mutation: Mutation<'_>) -> ShipResult<Workflow> {
        let mut cache = self.cache.write().await;
        let record = cache.get_mut(id).ok_or_else(|| ShipError::not_found(id))?;
        mutation(record);
        let snapshot = record.clone();
        // The in-memory record stays authoritative if the write fails; the
        // next successful mutation rewrites the whole file.
        if let Err(e) = self.persist(&cache).await {
            tracing::error!("Workflow {} updated but not persisted: {}", id, e);
        }
        Ok(snapshot)
    }

    async fn list(&self, filter: &WorkflowFilter) -> ShipResult<Vec<Workflow>> {
        let cache = self.cache.read().await;
        Ok(filter.apply(cache.values().cloned()))
    }

    async fn len(&self) -> ShipResult<usize> {
        Ok(self.cache.read().await.len())
    }
}
