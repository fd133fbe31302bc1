//! Workflow Orchestrator
//!
//! Owns workflow records and drives each one through the six-stage pipeline:
//! design, validate, approval, generate, deploy, verify.
//!
//! `start` launches the pipeline on its own task and returns immediately.
//! The task is its own error boundary; a stage error or a panic still ends
//! with a terminal write to the store. Terminal writes and `cancel` are
//! compare-and-set on `running`, so whichever lands first wins and the loser
//! is logged.

use futures::FutureExt;
use ship_core::{
    ApprovalDecision, ApprovalThresholds, Collaborators, DeployResult, DesignResult, GateRequest,
    GenerateResult, ShipError, ShipResult, Stage, ValidateResult, ValidationReport, VerifyResult,
    Workflow, WorkflowFilter, WorkflowId, WorkflowParams, WorkflowStatus, WorkflowStore,
    COMPLETED_MESSAGE,
};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};
use tracing::{debug, error, info, warn};

use crate::events::{EventSink, WorkflowEvent};
use crate::executor::StageExecutor;
use crate::gate::ApprovalGate;

/// Reason sent to the provisioner when rolling back a failed verification
pub const ROLLBACK_REASON: &str = "post-deploy verification failed";

/// Drives workflows through the deployment pipeline
#[derive(Clone)]
pub struct WorkflowOrchestrator {
    store: Arc<dyn WorkflowStore>,
    collaborators: Collaborators,
    gate: Arc<ApprovalGate>,
    events: EventSink,
    limiter: Option<Arc<Semaphore>>,
    tracker: Arc<ActiveTracker>,
}

impl WorkflowOrchestrator {
    /// Create an orchestrator with default approval thresholds
    pub fn new(store: Arc<dyn WorkflowStore>, collaborators: Collaborators) -> Self {
        let gate = ApprovalGate::new(ApprovalThresholds::default(), &collaborators);
        Self {
            store,
            collaborators,
            gate: Arc::new(gate),
            events: EventSink::default(),
            limiter: None,
            tracker: Arc::new(ActiveTracker::default()),
        }
    }

    /// Use `thresholds` for the approval stage
    pub fn with_thresholds(mut self, thresholds: ApprovalThresholds) -> Self {
        self.gate = Arc::new(ApprovalGate::new(thresholds, &self.collaborators));
        self
    }

    /// Stream lifecycle events to `tx`
    pub fn with_event_channel(mut self, tx: mpsc::Sender<WorkflowEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    /// Bound the number of pipelines executing at once
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    /// Create a workflow and launch its pipeline without waiting for it
    pub async fn start(&self, params: WorkflowParams) -> ShipResult<WorkflowId> {
        params.validate()?;

        let workflow = Workflow::new(params.clone());
        let id = workflow.id.clone();
        self.store.insert(workflow).await?;

        info!(
            workflow_id = %id,
            environment = %params.environment,
            automation_level = params.automation_level,
            "Workflow started"
        );
        self.events
            .emit(WorkflowEvent::Started {
                workflow_id: id.clone(),
                environment: params.environment.clone(),
                automation_level: params.automation_level,
            });

        let pipeline = Pipeline {
            id: id.clone(),
            params,
            store: self.store.clone(),
            collaborators: self.collaborators.clone(),
            gate: self.gate.clone(),
            executor: StageExecutor::new(self.store.clone(), self.events.clone()),
            events: self.events.clone(),
        };
        let active = self.tracker.enter();
        let limiter = self.limiter.clone();

        tokio::spawn(async move {
            let _active = active;
            let _permit = match limiter {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };
            pipeline.run().await;
        });

        Ok(id)
    }

    /// Snapshot of a workflow
    pub async fn status(&self, id: &str) -> ShipResult<Workflow> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ShipError::not_found(id))
    }

    /// Mark a running workflow cancelled. Returns false if it had already
    /// reached a terminal status. In-flight collaborator calls are not
    /// interrupted; the pipeline stops before its next stage.
    pub async fn cancel(&self, id: &str) -> ShipResult<bool> {
        let mut cancelled = false;
        let snapshot = self
            .store
            .update(id, Box::new(|wf: &mut Workflow| cancelled = wf.cancel()))
            .await?;

        if cancelled {
            info!(workflow_id = %id, step = ?snapshot.current_step, "Workflow cancelled");
            self.events
                .emit(WorkflowEvent::Cancelled {
                    workflow_id: id.to_string(),
                });
        } else {
            debug!(workflow_id = %id, status = %snapshot.status, "Cancel ignored for terminal workflow");
        }
        Ok(cancelled)
    }

    /// Workflows matching `filter`, newest first
    pub async fn list(&self, filter: &WorkflowFilter) -> ShipResult<Vec<Workflow>> {
        self.store.list(filter).await
    }

    /// Number of pipeline tasks that have not yet exited
    pub fn active_count(&self) -> usize {
        self.tracker.count()
    }

    /// Wait for running pipelines to exit, up to `timeout`. Returns true if
    /// every pipeline finished in time.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let active = self.active_count();
        if active > 0 {
            info!("Waiting up to {:?} for {} active workflow(s)", timeout, active);
        }

        let drained = self.tracker.wait_idle(timeout).await;
        if !drained {
            warn!(
                "Shutdown timed out with {} workflow(s) still running",
                self.active_count()
            );
        }
        drained
    }
}

// ============================================================================
// Pipeline task
// ============================================================================

enum PipelineExit {
    Completed,
    Cancelled,
}

/// Everything one spawned pipeline needs; owned by its task
struct Pipeline {
    id: WorkflowId,
    params: WorkflowParams,
    store: Arc<dyn WorkflowStore>,
    collaborators: Collaborators,
    gate: Arc<ApprovalGate>,
    executor: StageExecutor,
    events: EventSink,
}

impl Pipeline {
    async fn run(self) {
        let outcome = AssertUnwindSafe(self.execute()).catch_unwind().await;

        let (status, message) = match outcome {
            Ok(Ok(PipelineExit::Completed)) => {
                (WorkflowStatus::Completed, COMPLETED_MESSAGE.to_string())
            }
            Ok(Ok(PipelineExit::Cancelled)) => {
                info!(workflow_id = %self.id, "Pipeline stopped after cancellation");
                return;
            }
            Ok(Err(e)) => (WorkflowStatus::Failed, e.to_string()),
            Err(panic) => {
                let message = format!("pipeline panicked: {}", panic_message(panic.as_ref()));
                error!(workflow_id = %self.id, "{}", message);
                let error = message.clone();
                if let Err(e) = self
                    .record(move |wf| {
                        wf.fail_open_steps(&error);
                    })
                    .await
                {
                    error!(workflow_id = %self.id, "Failed to close open steps: {}", e);
                }
                (WorkflowStatus::Failed, message)
            }
        };

        self.finish(status, message).await;
    }

    async fn execute(&self) -> ShipResult<PipelineExit> {
        if self.cancelled().await? {
            return Ok(PipelineExit::Cancelled);
        }
        let design = self
            .executor
            .run(&self.id, Stage::Design, || self.design())
            .await?;

        if self.cancelled().await? {
            return Ok(PipelineExit::Cancelled);
        }
        self.executor
            .run(&self.id, Stage::Validate, || self.validate(&design.blueprint_id))
            .await?;

        if self.cancelled().await? {
            return Ok(PipelineExit::Cancelled);
        }
        self.executor
            .run(&self.id, Stage::Approval, || self.approve(&design.blueprint_id))
            .await?;

        if self.cancelled().await? {
            return Ok(PipelineExit::Cancelled);
        }
        let generated = self
            .executor
            .run(&self.id, Stage::Generate, || self.generate(&design.blueprint_id))
            .await?;

        if self.cancelled().await? {
            return Ok(PipelineExit::Cancelled);
        }
        let deployed = self
            .executor
            .run(&self.id, Stage::Deploy, || self.deploy(&generated.iac_job_id))
            .await?;

        if self.cancelled().await? {
            return Ok(PipelineExit::Cancelled);
        }
        self.executor
            .run(&self.id, Stage::Verify, || self.verify(&deployed.deployment_id))
            .await?;

        Ok(PipelineExit::Completed)
    }

    async fn cancelled(&self) -> ShipResult<bool> {
        let workflow = self
            .store
            .get(&self.id)
            .await?
            .ok_or_else(|| ShipError::not_found(&self.id))?;
        Ok(workflow.status == WorkflowStatus::Cancelled)
    }

    /// Terminal write; loses to any status already written
    async fn finish(&self, status: WorkflowStatus, message: String) {
        let mut won = false;
        let attempted = message.clone();
        let result = self
            .store
            .update(
                &self.id,
                Box::new(|wf: &mut Workflow| won = wf.finish(status, attempted)),
            )
            .await;

        match result {
            Ok(_) if won => {
                if status == WorkflowStatus::Completed {
                    info!(workflow_id = %self.id, "Workflow completed");
                } else {
                    warn!(workflow_id = %self.id, "Workflow failed: {}", message);
                }
                self.events
                    .emit(WorkflowEvent::Finished {
                        workflow_id: self.id.clone(),
                        status,
                        message,
                    });
            }
            Ok(snapshot) => {
                warn!(
                    workflow_id = %self.id,
                    current = %snapshot.status,
                    discarded = %status,
                    "Terminal transition lost to a concurrent update: {}",
                    message
                );
            }
            Err(e) => {
                error!(
                    workflow_id = %self.id,
                    "Failed to record terminal status {}: {}",
                    status,
                    e
                );
            }
        }
    }

    async fn record(&self, mutation: impl FnOnce(&mut Workflow) + Send + 'static) -> ShipResult<()> {
        self.store.update(&self.id, Box::new(mutation)).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------------

    async fn design(&self) -> ShipResult<DesignResult> {
        let blueprint = self
            .collaborators
            .blueprints
            .generate(&self.params.requirements, self.params.allows_automation())
            .await?;

        let blueprint_id = blueprint.id.clone();
        self.record(move |wf| {
            wf.set_blueprint_id(blueprint_id);
        })
        .await?;

        Ok(DesignResult {
            blueprint_id: blueprint.id,
            version: blueprint.version,
        })
    }

    /// Validate, with one remediate-and-revalidate attempt when automation
    /// is allowed
    async fn validate(&self, blueprint_id: &str) -> ShipResult<ValidateResult> {
        let automated = self.params.allows_automation();
        let guardrails = &self.collaborators.guardrails;

        let first = guardrails.validate(blueprint_id, automated).await?;
        if first.passed {
            return Ok(validated(&first, false, 0));
        }

        if !automated {
            return Err(ShipError::stage(
                Stage::Validate,
                with_violations("validation failed", &first),
            ));
        }

        info!(
            workflow_id = %self.id,
            violations = first.violations.len(),
            "Validation failed, attempting remediation"
        );
        self.events
            .emit(WorkflowEvent::Remediating {
                workflow_id: self.id.clone(),
                violations: first.violations.len(),
            });

        guardrails.remediate(blueprint_id, &first.violations).await?;
        let second = guardrails.validate(blueprint_id, automated).await?;
        if !second.passed {
            return Err(ShipError::stage(
                Stage::Validate,
                with_violations("validation failed after remediation", &second),
            ));
        }

        Ok(validated(&second, true, first.violations.len()))
    }

    async fn approve(&self, blueprint_id: &str) -> ShipResult<ApprovalDecision> {
        let request = GateRequest::new(
            blueprint_id,
            self.params.environment.clone(),
            self.params.automation_level,
        );
        let decision = self.gate.evaluate(&request).await;

        if decision.approved {
            return Ok(decision);
        }
        let message = if self.params.allows_automation() {
            format!("auto-approval denied: {}", decision.reason_or_empty())
        } else {
            "manual approval required".to_string()
        };
        Err(ShipError::stage(Stage::Approval, message))
    }

    async fn generate(&self, blueprint_id: &str) -> ShipResult<GenerateResult> {
        let job = self.collaborators.iac.generate(blueprint_id).await?;

        let job_id = job.job_id.clone();
        self.record(move |wf| {
            wf.set_iac_job_id(job_id);
        })
        .await?;

        Ok(GenerateResult {
            iac_job_id: job.job_id,
        })
    }

    async fn deploy(&self, iac_job_id: &str) -> ShipResult<DeployResult> {
        let deployment = self
            .collaborators
            .provisioner
            .deploy(iac_job_id, self.params.allows_automation())
            .await?;

        let deployment_id = deployment.deployment_id.clone();
        self.record(move |wf| {
            wf.set_deployment_id(deployment_id);
        })
        .await?;

        Ok(DeployResult {
            deployment_id: deployment.deployment_id,
        })
    }

    /// Verify, rolling back once on failure when automation is allowed
    async fn verify(&self, deployment_id: &str) -> ShipResult<VerifyResult> {
        let provisioner = &self.collaborators.provisioner;
        let report = provisioner.verify(deployment_id).await?;
        if report.success {
            return Ok(VerifyResult {
                deployment_id: deployment_id.to_string(),
                healthy: true,
            });
        }

        if !self.params.allows_automation() {
            return Err(ShipError::stage(Stage::Verify, "post-deploy verification failed"));
        }

        warn!(workflow_id = %self.id, deployment_id, "Verification failed, rolling back");
        self.events
            .emit(WorkflowEvent::RollingBack {
                workflow_id: self.id.clone(),
                deployment_id: deployment_id.to_string(),
            });

        if let Err(e) = provisioner.rollback(deployment_id, ROLLBACK_REASON).await {
            return Err(ShipError::stage(
                Stage::Verify,
                format!("verification failed, rollback failed: {}", e),
            ));
        }
        Err(ShipError::stage(Stage::Verify, "verification failed, rolled back"))
    }
}

fn validated(report: &ValidationReport, remediated: bool, violations_remediated: usize) -> ValidateResult {
    ValidateResult {
        passed: true,
        remediated,
        violations_remediated,
        security_score: report.security_score,
        complexity_score: report.complexity_score,
    }
}

fn with_violations(prefix: &str, report: &ValidationReport) -> String {
    let summary = report.violation_summary();
    if summary.is_empty() {
        prefix.to_string()
    } else {
        format!("{}: {}", prefix, summary)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ============================================================================
// Active pipeline tracking
// ============================================================================

#[derive(Default)]
struct ActiveTracker {
    active: AtomicUsize,
    idle: Notify,
}

impl ActiveTracker {
    fn enter(self: &Arc<Self>) -> ActiveGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        ActiveGuard {
            tracker: self.clone(),
        }
    }

    fn count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.count() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.count() == 0;
            }
        }
    }
}

struct ActiveGuard {
    tracker: Arc<ActiveTracker>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.tracker.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.idle.notify_waiters();
        }
    }
}
