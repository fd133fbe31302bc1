//! Workflow lifecycle events

use serde::Serialize;
use ship_core::{Stage, WorkflowId, WorkflowStatus};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Events emitted while a workflow runs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkflowEvent {
    /// Workflow record created and pipeline launched
    Started {
        workflow_id: WorkflowId,
        environment: String,
        automation_level: u8,
    },
    StageStarted {
        workflow_id: WorkflowId,
        stage: Stage,
    },
    StageCompleted {
        workflow_id: WorkflowId,
        stage: Stage,
        duration_ms: u64,
    },
    StageFailed {
        workflow_id: WorkflowId,
        stage: Stage,
        error: String,
    },
    /// Validation failed; remediation is being attempted
    Remediating {
        workflow_id: WorkflowId,
        violations: usize,
    },
    /// Verification failed; the deployment is being rolled back
    RollingBack {
        workflow_id: WorkflowId,
        deployment_id: String,
    },
    /// Pipeline wrote its terminal status
    Finished {
        workflow_id: WorkflowId,
        status: WorkflowStatus,
        message: String,
    },
    Cancelled {
        workflow_id: WorkflowId,
    },
}

impl WorkflowEvent {
    pub fn workflow_id(&self) -> &str {
        match self {
            Self::Started { workflow_id, .. }
            | Self::StageStarted { workflow_id, .. }
            | Self::StageCompleted { workflow_id, .. }
            | Self::StageFailed { workflow_id, .. }
            | Self::Remediating { workflow_id, .. }
            | Self::RollingBack { workflow_id, .. }
            | Self::Finished { workflow_id, .. }
            | Self::Cancelled { workflow_id } => workflow_id,
        }
    }
}

/// Optional event channel. Sends never wait: events for a missing, closed, or
/// full receiver are dropped.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<WorkflowEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<WorkflowEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn emit(&self, event: WorkflowEvent) {
        let Some(ref tx) = self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!(workflow_id = %event.workflow_id(), "Event channel full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Workflow event receiver dropped");
            }
        }
    }
}
