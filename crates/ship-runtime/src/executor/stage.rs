//! Stage Executor - runs one named pipeline stage against a stored workflow
//!
//! The executor owns step bookkeeping only. It opens a running step record,
//! closes it with the stage's result or error, and hands failures straight
//! back to the caller; remediation policy belongs to the orchestrator.

use ship_core::{ShipResult, Stage, StageResult, Workflow, WorkflowStore};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::events::{EventSink, WorkflowEvent};

#[derive(Clone)]
pub struct StageExecutor {
    store: Arc<dyn WorkflowStore>,
    events: EventSink,
}

impl StageExecutor {
    pub fn new(store: Arc<dyn WorkflowStore>, events: EventSink) -> Self {
        Self { store, events }
    }

    /// Run `stage_fn` as `stage` of workflow `id`
    ///
    /// Sets `currentStep`, appends a running record, then completes or fails
    /// that record. A stage error is returned unchanged after it is recorded.
    pub async fn run<T, F, Fut>(&self, id: &str, stage: Stage, stage_fn: F) -> ShipResult<T>
    where
        T: Clone + Into<StageResult>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ShipResult<T>>,
    {
        self.store
            .update(id, Box::new(move |wf: &mut Workflow| wf.begin_step(stage)))
            .await?;
        info!(workflow_id = %id, stage = %stage, "Stage started");
        self.events
            .emit(WorkflowEvent::StageStarted {
                workflow_id: id.to_string(),
                stage,
            });

        let started = Instant::now();
        let outcome = stage_fn().await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                let recorded: StageResult = output.clone().into();
                self.store
                    .update(
                        id,
                        Box::new(move |wf: &mut Workflow| {
                            if let Some(step) = wf.open_step_mut(stage) {
                                step.complete(recorded);
                            }
                        }),
                    )
                    .await?;
                info!(workflow_id = %id, stage = %stage, duration_ms, "Stage completed");
                self.events
                    .emit(WorkflowEvent::StageCompleted {
                        workflow_id: id.to_string(),
                        stage,
                        duration_ms,
                    });
                Ok(output)
            }
            Err(err) => {
                let message = err.to_string();
                let recorded = message.clone();
                self.store
                    .update(
                        id,
                        Box::new(move |wf: &mut Workflow| {
                            if let Some(step) = wf.open_step_mut(stage) {
                                step.fail(recorded);
                            }
                        }),
                    )
                    .await?;
                error!(workflow_id = %id, stage = %stage, duration_ms, "Stage failed: {}", message);
                self.events
                    .emit(WorkflowEvent::StageFailed {
                        workflow_id: id.to_string(),
                        stage,
                        error: message,
                    });
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ship_core::{
        GenerateResult, ShipError, StepStatus, WorkflowFilter, WorkflowParams,
    };
    use std::collections::HashMap;
    use tokio::sync::{mpsc, Mutex};

    // Minimal store so the executor can be tested without a backend crate.
    #[derive(Default)]
    struct MapStore {
        records: Mutex<HashMap<String, Workflow>>,
    }

    #[async_trait::async_trait]
    impl WorkflowStore for MapStore {
        async fn insert(&self, workflow: Workflow) -> ShipResult<()> {
            self.records.lock().await.insert(workflow.id.clone(), workflow);
            Ok(())
        }

        async fn get(&self, id: &str) -> ShipResult<Option<Workflow>> {
            Ok(self.records.lock().await.get(id).cloned())
        }

        async fn update(&self, id: &str, mutation: ship_core::Mutation<'_>) -> ShipResult<Workflow> {
            let mut records = self.records.lock().await;
            let wf = records.get_mut(id).ok_or_else(|| ShipError::not_found(id))?;
            mutation(wf);
            Ok(wf.clone())
        }

        async fn list(&self, filter: &WorkflowFilter) -> ShipResult<Vec<Workflow>> {
            Ok(filter.apply(self.records.lock().await.values().cloned()))
        }

        async fn len(&self) -> ShipResult<usize> {
            Ok(self.records.lock().await.len())
        }
    }

    async fn setup() -> (StageExecutor, Arc<MapStore>, String, mpsc::Receiver<WorkflowEvent>) {
        let store = Arc::new(MapStore::default());
        let wf = Workflow::new(WorkflowParams::new("cdn", 2, "dev"));
        let id = wf.id.clone();
        store.insert(wf).await.unwrap();
        let (tx, rx) = mpsc::channel(16);
        let executor = StageExecutor::new(store.clone(), EventSink::new(tx));
        (executor, store, id, rx)
    }

    #[tokio::test]
    async fn test_successful_stage_records_result() {
        let (executor, store, id, mut rx) = setup().await;

        let output = executor
            .run(&id, Stage::Generate, || async {
                Ok(GenerateResult {
                    iac_job_id: "job-1".into(),
                })
            })
            .await
            .unwrap();
        assert_eq!(output.iac_job_id, "job-1");

        let wf = store.get(&id).await.unwrap().unwrap();
        assert_eq!(wf.current_step, Some(Stage::Generate));
        assert_eq!(wf.steps.len(), 1);
        let step = &wf.steps[0];
        assert_eq!(step.status, StepStatus::Completed);
        assert!(step.completed_at.is_some());
        assert!(step.error.is_none());
        assert!(matches!(step.result, Some(StageResult::Generate(_))));

        assert!(matches!(rx.recv().await, Some(WorkflowEvent::StageStarted { .. })));
        assert!(matches!(rx.recv().await, Some(WorkflowEvent::StageCompleted { .. })));
    }

    #[tokio::test]
    async fn test_failed_stage_reraises() {
        let (executor, store, id, mut rx) = setup().await;

        let err = executor
            .run(&id, Stage::Deploy, || async {
                Err::<GenerateResult, _>(ShipError::collaborator("provisioning-service", "HTTP 500: boom"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ShipError::Collaborator { .. }));

        let wf = store.get(&id).await.unwrap().unwrap();
        let step = &wf.steps[0];
        assert_eq!(step.status, StepStatus::Failed);
        assert!(step.result.is_none());
        assert_eq!(
            step.error.as_deref(),
            Some("provisioning-service call failed: HTTP 500: boom")
        );
        // The executor never touches workflow status
        assert_eq!(wf.status, ship_core::WorkflowStatus::Running);

        rx.recv().await;
        match rx.recv().await {
            Some(WorkflowEvent::StageFailed { stage, error, .. }) => {
                assert_eq!(stage, Stage::Deploy);
                assert!(error.contains("HTTP 500"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_workflow_is_not_found() {
        let (executor, _store, _id, _rx) = setup().await;
        let err = executor
            .run("missing", Stage::Design, || async {
                Ok(GenerateResult {
                    iac_job_id: "never".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ShipError::NotFound(_)));
    }
}
