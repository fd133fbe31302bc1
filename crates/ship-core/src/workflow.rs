//! Workflow state model
//!
//! A [`Workflow`] is one run of the six-stage deployment pipeline. It owns an
//! append-only list of [`StepRecord`]s whose order is the execution order, and
//! its status only ever moves out of `running` once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::approval::ApprovalDecision;
use crate::error::ShipError;

/// Opaque workflow identifier
pub type WorkflowId = String;

/// Terminal message written when all six stages complete
pub const COMPLETED_MESSAGE: &str = "All steps completed successfully";

/// Workflow execution status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// Pipeline is executing
    Running,
    /// All stages completed
    Completed,
    /// A stage failed terminally
    Failed,
    /// Cancelled by a caller
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = ShipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(ShipError::invalid_request(format!(
                "unknown workflow status '{}'",
                other
            ))),
        }
    }
}

/// A named pipeline stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Design,
    Validate,
    Approval,
    Generate,
    Deploy,
    Verify,
}

impl Stage {
    /// Stages in pipeline order
    pub const PIPELINE: [Stage; 6] = [
        Stage::Design,
        Stage::Validate,
        Stage::Approval,
        Stage::Generate,
        Stage::Deploy,
        Stage::Verify,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Design => "design",
            Self::Validate => "validate",
            Self::Approval => "approval",
            Self::Generate => "generate",
            Self::Deploy => "deploy",
            Self::Verify => "verify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single step record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
}

/// Output of the design stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DesignResult {
    pub blueprint_id: String,
    pub version: String,
}

/// Output of the validate stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResult {
    pub passed: bool,
    /// Whether a remediation pass was needed before validation passed
    pub remediated: bool,
    /// Violations reported by the first validation, fixed by remediation
    pub violations_remediated: usize,
    pub security_score: f64,
    pub complexity_score: f64,
}

/// Output of the generate stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResult {
    pub iac_job_id: String,
}

/// Output of the deploy stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    pub deployment_id: String,
}

/// Output of the verify stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub deployment_id: String,
    pub healthy: bool,
}

/// Stage-specific step payload, tagged by stage name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum StageResult {
    Design(DesignResult),
    Validate(ValidateResult),
    Approval(ApprovalDecision),
    Generate(GenerateResult),
    Deploy(DeployResult),
    Verify(VerifyResult),
}

impl StageResult {
    /// Stage this payload belongs to
    pub fn stage(&self) -> Stage {
        match self {
            Self::Design(_) => Stage::Design,
            Self::Validate(_) => Stage::Validate,
            Self::Approval(_) => Stage::Approval,
            Self::Generate(_) => Stage::Generate,
            Self::Deploy(_) => Stage::Deploy,
            Self::Verify(_) => Stage::Verify,
        }
    }
}

macro_rules! impl_stage_result_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for StageResult {
                fn from(result: $ty) -> Self {
                    StageResult::$variant(result)
                }
            }
        )*
    };
}

impl_stage_result_from! {
    DesignResult => Design,
    ValidateResult => Validate,
    ApprovalDecision => Approval,
    GenerateResult => Generate,
    DeployResult => Deploy,
    VerifyResult => Verify,
}

/// One attempted pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub name: Stage,

    pub status: StepStatus,

    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<StageResult>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    /// Open a record for a stage that is about to run
    pub fn start(name: Stage) -> Self {
        Self {
            name,
            status: StepStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn complete(&mut self, result: StageResult) {
        self.status = StepStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        self.error = None;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.result = None;
        self.error = Some(error.into());
    }

    /// Wall-clock duration once the step has closed
    pub fn duration_ms(&self) -> Option<u64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
    }
}

/// Immutable input captured when a workflow is started
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowParams {
    /// Natural-language infrastructure requirements
    pub requirements: String,

    /// 0-1 require human sign-off, 2+ allow auto-approval, 3+ allow prod
    pub automation_level: u8,

    /// Target environment (dev, staging, prod, ...)
    pub environment: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl WorkflowParams {
    pub fn new(
        requirements: impl Into<String>,
        automation_level: u8,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            requirements: requirements.into(),
            automation_level,
            environment: environment.into(),
            requested_by: None,
            tenant_id: None,
        }
    }

    pub fn with_requester(mut self, user: impl Into<String>) -> Self {
        self.requested_by = Some(user.into());
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant.into());
        self
    }

    /// Presence check for required fields
    pub fn validate(&self) -> Result<(), ShipError> {
        if self.requirements.trim().is_empty() {
            return Err(ShipError::invalid_request("requirements must not be empty"));
        }
        if self.environment.trim().is_empty() {
            return Err(ShipError::invalid_request("environment must not be empty"));
        }
        Ok(())
    }

    /// Whether this run may proceed without a human in the loop
    pub fn allows_automation(&self) -> bool {
        self.automation_level >= 2
    }
}

/// One end-to-end run of the deployment pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: WorkflowId,

    pub status: WorkflowStatus,

    /// Most recently entered stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<Stage>,

    pub steps: Vec<StepRecord>,

    pub params: WorkflowParams,

    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub blueprint_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iac_job_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,

    /// Outcome summary, set on terminal transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Workflow {
    /// Create a running workflow with a fresh identifier
    pub fn new(params: WorkflowParams) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status: WorkflowStatus::Running,
            current_step: None,
            steps: Vec::new(),
            params,
            started_at: Utc::now(),
            completed_at: None,
            blueprint_id: None,
            iac_job_id: None,
            deployment_id: None,
            message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Enter a stage: update `current_step` and append a running record
    pub fn begin_step(&mut self, stage: Stage) {
        self.current_step = Some(stage);
        self.steps.push(StepRecord::start(stage));
    }

    /// The open record for `stage`, i.e. the last one appended under that name
    pub fn open_step_mut(&mut self, stage: Stage) -> Option<&mut StepRecord> {
        self.steps
            .iter_mut()
            .rev()
            .find(|s| s.name == stage && s.status == StepStatus::Running)
    }

    /// Most recent record for `stage`
    pub fn step(&self, stage: Stage) -> Option<&StepRecord> {
        self.steps.iter().rev().find(|s| s.name == stage)
    }

    /// Fail every record still marked running, returning how many were closed
    pub fn fail_open_steps(&mut self, error: &str) -> usize {
        let mut closed = 0;
        for step in self.steps.iter_mut().filter(|s| s.status == StepStatus::Running) {
            step.fail(error);
            closed += 1;
        }
        closed
    }

    /// Move `running -> status`. Returns false, leaving the record untouched,
    /// when the workflow has already reached a terminal status.
    pub fn finish(&mut self, status: WorkflowStatus, message: impl Into<String>) -> bool {
        if self.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.message = Some(message.into());
        self.completed_at = Some(Utc::now());
        true
    }

    /// Move `running -> cancelled`; no-op on terminal workflows
    pub fn cancel(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = WorkflowStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        true
    }

    pub fn set_blueprint_id(&mut self, id: impl Into<String>) -> bool {
        assign_once(&mut self.blueprint_id, id.into())
    }

    pub fn set_iac_job_id(&mut self, id: impl Into<String>) -> bool {
        assign_once(&mut self.iac_job_id, id.into())
    }

    pub fn set_deployment_id(&mut self, id: impl Into<String>) -> bool {
        assign_once(&mut self.deployment_id, id.into())
    }
}

// Identifiers are write-once per run.
fn assign_once(slot: &mut Option<String>, value: String) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> WorkflowParams {
        WorkflowParams::new("three-tier web app", 2, "dev")
    }

    #[test]
    fn test_new_workflow_is_running() {
        let wf = Workflow::new(params());
        assert_eq!(wf.status, WorkflowStatus::Running);
        assert!(wf.steps.is_empty());
        assert!(wf.completed_at.is_none());
        assert!(wf.message.is_none());
    }

    #[test]
    fn test_finish_is_monotonic() {
        let mut wf = Workflow::new(params());
        assert!(wf.finish(WorkflowStatus::Failed, "boom"));
        assert!(!wf.finish(WorkflowStatus::Completed, COMPLETED_MESSAGE));
        assert!(!wf.cancel());
        assert_eq!(wf.status, WorkflowStatus::Failed);
        assert_eq!(wf.message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_finish_rejects_running_target() {
        let mut wf = Workflow::new(params());
        assert!(!wf.finish(WorkflowStatus::Running, "noop"));
        assert!(wf.message.is_none());
    }

    #[test]
    fn test_cancel_then_finish_keeps_cancelled() {
        let mut wf = Workflow::new(params());
        assert!(wf.cancel());
        assert!(!wf.finish(WorkflowStatus::Completed, COMPLETED_MESSAGE));
        assert_eq!(wf.status, WorkflowStatus::Cancelled);
        assert!(wf.message.is_none());
        assert!(wf.completed_at.is_some());
    }

    #[test]
    fn test_identifiers_are_write_once() {
        let mut wf = Workflow::new(params());
        assert!(wf.set_blueprint_id("bp-1"));
        assert!(!wf.set_blueprint_id("bp-2"));
        assert_eq!(wf.blueprint_id.as_deref(), Some("bp-1"));
    }

    #[test]
    fn test_step_lifecycle() {
        let mut wf = Workflow::new(params());
        wf.begin_step(Stage::Design);
        assert_eq!(wf.current_step, Some(Stage::Design));

        let step = wf.open_step_mut(Stage::Design).unwrap();
        step.complete(StageResult::Design(DesignResult {
            blueprint_id: "bp-1".into(),
            version: "1.0.0".into(),
        }));

        let step = wf.step(Stage::Design).unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert!(step.result.is_some());
        assert!(step.error.is_none());
        assert!(step.duration_ms().is_some());
        assert!(wf.open_step_mut(Stage::Design).is_none());
    }

    #[test]
    fn test_fail_open_steps() {
        let mut wf = Workflow::new(params());
        wf.begin_step(Stage::Design);
        wf.open_step_mut(Stage::Design).unwrap().complete(StageResult::Design(DesignResult {
            blueprint_id: "bp-1".into(),
            version: "1".into(),
        }));
        wf.begin_step(Stage::Validate);
        assert_eq!(wf.fail_open_steps("pipeline panicked: boom"), 1);
        assert_eq!(wf.steps[0].status, StepStatus::Completed);
        assert_eq!(wf.steps[1].error.as_deref(), Some("pipeline panicked: boom"));
        assert_eq!(wf.fail_open_steps("again"), 0);
    }

    #[test]
    fn test_failed_step_has_error_only() {
        let mut record = StepRecord::start(Stage::Generate);
        record.fail("iac-generator call failed: timeout");
        assert_eq!(record.status, StepStatus::Failed);
        assert!(record.result.is_none());
        assert_eq!(record.error.as_deref(), Some("iac-generator call failed: timeout"));
    }

    #[test]
    fn test_stage_result_is_tagged() {
        let result = StageResult::Generate(GenerateResult {
            iac_job_id: "job-9".into(),
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["stage"], "generate");
        assert_eq!(json["iacJobId"], "job-9");

        let parsed: StageResult = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.stage(), Stage::Generate);
    }

    #[test]
    fn test_workflow_serializes_camel_case() {
        let wf = Workflow::new(params().with_tenant("acme"));
        let json = serde_json::to_value(&wf).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["params"]["automationLevel"], 2);
        assert_eq!(json["params"]["tenantId"], "acme");
        assert!(json.get("completedAt").is_none());
    }

    #[test]
    fn test_params_require_fields() {
        assert!(params().validate().is_ok());
        assert!(WorkflowParams::new("  ", 2, "dev").validate().is_err());
        assert!(WorkflowParams::new("vpc", 2, "").validate().is_err());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Completed".parse::<WorkflowStatus>().unwrap(), WorkflowStatus::Completed);
        assert_eq!("canceled".parse::<WorkflowStatus>().unwrap(), WorkflowStatus::Cancelled);
        assert!("paused".parse::<WorkflowStatus>().is_err());
    }
}
