//! In-memory workflow store

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ship_core::{Mutation, ShipError, ShipResult, Workflow, WorkflowFilter, WorkflowStore};
use std::sync::Arc;

/// Lock-free concurrent store; each `update` holds only its own shard lock
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Arc<DashMap<String, Workflow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn insert(&self, workflow: Workflow) -> ShipResult<()> {
        match self.records.entry(workflow.id.clone()) {
            Entry::Occupied(_) => Err(ShipError::store(format!(
                "workflow '{}' already exists",
                workflow.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(workflow);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> ShipResult<Option<Workflow>> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn update(&self, id: &str, mutation: Mutation<'_>) -> ShipResult<Workflow> {
        let mut record = self
            .records
            .get_mut(id)
            .ok_or_else(|| ShipError::not_found(id))?;
        mutation(record.value_mut());
        Ok(record.value().clone())
    }

    async fn list(&self, filter: &WorkflowFilter) -> ShipResult<Vec<Workflow>> {
        let snapshot: Vec<Workflow> = self.records.iter().map(|r| r.value().clone()).collect();
        Ok(filter.apply(snapshot))
    }

    async fn len(&self) -> ShipResult<usize> {
        Ok(self.records.len())
    }
}
