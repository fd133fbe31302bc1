//! Workflow store abstraction
//!
//! The orchestrator keeps every workflow record behind [`WorkflowStore`].
//! Mutations are closures applied atomically per record, so a status
//! compare-and-set and a step append can never interleave on the same id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ShipResult;
use crate::workflow::{Workflow, WorkflowStatus};

/// Default page size for [`WorkflowFilter`]
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// In-place edit applied to one stored workflow
pub type Mutation<'a> = Box<dyn FnOnce(&mut Workflow) + Send + 'a>;

/// Keyed store of workflow records
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert a new record; fails if the id already exists
    async fn insert(&self, workflow: Workflow) -> ShipResult<()>;

    /// Snapshot of a record
    async fn get(&self, id: &str) -> ShipResult<Option<Workflow>>;

    /// Apply `mutation` atomically and return the updated snapshot
    async fn update(&self, id: &str, mutation: Mutation<'_>) -> ShipResult<Workflow>;

    /// Records matching `filter`, newest first
    async fn list(&self, filter: &WorkflowFilter) -> ShipResult<Vec<Workflow>>;

    async fn len(&self) -> ShipResult<usize>;
}

/// Query for [`WorkflowStore::list`]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl WorkflowFilter {
    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, workflow: &Workflow) -> bool {
        if let Some(status) = self.status {
            if workflow.status != status {
                return false;
            }
        }
        if let Some(ref env) = self.environment {
            if &workflow.params.environment != env {
                return false;
            }
        }
        if let Some(ref tenant) = self.tenant_id {
            if workflow.params.tenant_id.as_ref() != Some(tenant) {
                return false;
            }
        }
        true
    }

    /// Filter, order newest first, and truncate to the limit
    pub fn apply<I>(&self, workflows: I) -> Vec<Workflow>
    where
        I: IntoIterator<Item = Workflow>,
    {
        let mut matched: Vec<Workflow> = workflows.into_iter().filter(|w| self.matches(w)).collect();
        matched.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));
        matched.truncate(self.limit.unwrap_or(DEFAULT_LIST_LIMIT));
        matched
    }
}
