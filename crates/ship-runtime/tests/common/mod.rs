//! Scriptable in-process collaborators shared by the runtime tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use ship_core::{
    BlueprintRef, BlueprintService, Collaborators, CostEstimate, CostService, DeploymentRef,
    GuardrailService, IacGenerator, IacJob, Provisioner, RiskAssessment, RiskEngine, ShipError,
    ShipResult, Stage, StagingLookup, ValidationReport, VerificationReport, Violation, Workflow,
    WorkflowStore,
};
use ship_runtime::WorkflowOrchestrator;
use ship_store::InMemoryStore;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Pass,
    /// Fails until `remediate` has been called once
    FailUntilRemediated,
    AlwaysFail,
}

/// Knobs for [`FakeServices`]; the default lets every stage succeed
#[derive(Debug, Clone)]
pub struct Behavior {
    pub validation: ValidationMode,
    pub security_score: f64,
    pub complexity_score: f64,
    pub risk_level: f64,
    pub within_budget: bool,
    pub staging_success: bool,
    pub verify_success: bool,
    pub iac_error: bool,
    pub risk_error: bool,
    pub staging_error: bool,
    pub remediate_error: bool,
    pub rollback_error: bool,
    pub panic_on_deploy: bool,
    /// Block inside this stage's collaborator call until released
    pub hold: Option<Stage>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            validation: ValidationMode::Pass,
            security_score: 95.0,
            complexity_score: 40.0,
            risk_level: 10.0,
            within_budget: true,
            staging_success: true,
            verify_success: true,
            iac_error: false,
            risk_error: false,
            staging_error: false,
            remediate_error: false,
            rollback_error: false,
            panic_on_deploy: false,
            hold: None,
        }
    }
}

/// One fake standing in for every collaborator, recording each call
pub struct FakeServices {
    behavior: Behavior,
    remediated: AtomicBool,
    calls: Mutex<Vec<String>>,
    /// Signalled when a held call is entered
    pub entered: Notify,
    /// Signal to let a held call return
    pub release: Notify,
}

impl FakeServices {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            remediated: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            entered: Notify::new(),
            release: Notify::new(),
        })
    }

    pub fn passing() -> Arc<Self> {
        Self::new(Behavior::default())
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            blueprints: self.clone(),
            guardrails: self.clone(),
            risk: self.clone(),
            costing: self.clone(),
            staging: self.clone(),
            iac: self.clone(),
            provisioner: self.clone(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls equal to `call`
    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    /// Number of recorded calls starting with `prefix`
    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    async fn maybe_hold(&self, stage: Stage) {
        if self.behavior.hold == Some(stage) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }
}

#[async_trait]
impl BlueprintService for FakeServices {
    async fn generate(&self, requirements: &str, auto_fix: bool) -> ShipResult<BlueprintRef> {
        self.record(format!("blueprint:{}", auto_fix));
        self.maybe_hold(Stage::Design).await;
        Ok(BlueprintRef {
            id: format!("bp-{}", requirements.len()),
            version: "1.0.0".to_string(),
        })
    }
}

#[async_trait]
impl GuardrailService for FakeServices {
    async fn validate(
        &self,
        _blueprint_id: &str,
        auto_remediate: bool,
    ) -> ShipResult<ValidationReport> {
        self.record(format!("validate:{}", auto_remediate));
        let passed = match self.behavior.validation {
            ValidationMode::Pass => true,
            ValidationMode::FailUntilRemediated => self.remediated.load(Ordering::SeqCst),
            ValidationMode::AlwaysFail => false,
        };
        let violations = if passed {
            vec![]
        } else {
            vec![
                Violation::new("SEC-001", "high", "storage bucket is public"),
                Violation::new("NET-004", "medium", "ssh open to 0.0.0.0/0"),
            ]
        };
        Ok(ValidationReport {
            passed,
            violations,
            security_score: self.behavior.security_score,
            complexity_score: self.behavior.complexity_score,
        })
    }

    async fn remediate(&self, _blueprint_id: &str, violations: &[Violation]) -> ShipResult<()> {
        self.record(format!("remediate:{}", violations.len()));
        if self.behavior.remediate_error {
            return Err(ShipError::collaborator("guardrails-engine", "HTTP 500: remediation engine crashed"));
        }
        self.remediated.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl RiskEngine for FakeServices {
    async fn assess(&self, _blueprint_id: &str, environment: &str) -> ShipResult<RiskAssessment> {
        self.record(format!("risk:{}", environment));
        if self.behavior.risk_error {
            return Err(ShipError::collaborator("risk-engine", "connection failed: refused"));
        }
        Ok(RiskAssessment {
            risk_level: self.behavior.risk_level,
        })
    }
}

#[async_trait]
impl CostService for FakeServices {
    async fn estimate(&self, _blueprint_id: &str) -> ShipResult<CostEstimate> {
        self.record("cost".to_string());
        Ok(CostEstimate {
            within_budget: self.behavior.within_budget,
        })
    }
}

#[async_trait]
impl StagingLookup for FakeServices {
    async fn has_successful_staging(&self, _blueprint_id: &str) -> ShipResult<bool> {
        self.record("staging".to_string());
        if self.behavior.staging_error {
            return Err(ShipError::collaborator("provisioning-service", "HTTP 502: bad gateway"));
        }
        Ok(self.behavior.staging_success)
    }
}

#[async_trait]
impl IacGenerator for FakeServices {
    async fn generate(&self, blueprint_id: &str) -> ShipResult<IacJob> {
        self.record("iac".to_string());
        if self.behavior.iac_error {
            return Err(ShipError::collaborator("iac-generator", "HTTP 503: generator overloaded"));
        }
        Ok(IacJob {
            job_id: format!("job-{}", blueprint_id),
        })
    }
}

#[async_trait]
impl Provisioner for FakeServices {
    async fn deploy(&self, iac_job_id: &str, auto_approve: bool) -> ShipResult<DeploymentRef> {
        self.record(format!("deploy:{}", auto_approve));
        if self.behavior.panic_on_deploy {
            panic!("provisioner exploded");
        }
        self.maybe_hold(Stage::Deploy).await;
        Ok(DeploymentRef {
            deployment_id: format!("dep-{}", iac_job_id),
        })
    }

    async fn verify(&self, _deployment_id: &str) -> ShipResult<VerificationReport> {
        self.record("verify".to_string());
        self.maybe_hold(Stage::Verify).await;
        Ok(VerificationReport {
            success: self.behavior.verify_success,
        })
    }

    async fn rollback(&self, deployment_id: &str, reason: &str) -> ShipResult<()> {
        self.record(format!("rollback:{}:{}", deployment_id, reason));
        if self.behavior.rollback_error {
            return Err(ShipError::collaborator("provisioning-service", "HTTP 409: rollback already in progress"));
        }
        Ok(())
    }
}

/// Orchestrator over an in-memory store
pub fn orchestrator(fake: &Arc<FakeServices>) -> WorkflowOrchestrator {
    let store: Arc<dyn WorkflowStore> = Arc::new(InMemoryStore::new());
    WorkflowOrchestrator::new(store, fake.collaborators())
}

/// Wait for every spawned pipeline to exit, then return the workflow
pub async fn settle(orchestrator: &WorkflowOrchestrator, id: &str) -> Workflow {
    assert!(
        orchestrator.shutdown(Duration::from_secs(5)).await,
        "pipelines did not finish"
    );
    orchestrator.status(id).await.unwrap()
}
