//! Remote collaborator interfaces
//!
//! The orchestrator never talks to a service directly. Each capability is a
//! trait so the runtime can be driven by HTTP clients in production and by
//! in-process fakes in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ShipResult;

/// Blueprint created from requirements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintRef {
    pub id: String,
    pub version: String,
}

/// A single guardrail policy violation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub rule_id: String,
    pub severity: String,
    pub message: String,
}

impl Violation {
    pub fn new(
        rule_id: impl Into<String>,
        severity: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity: severity.into(),
            message: message.into(),
        }
    }
}

/// Guardrail validation outcome
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub passed: bool,
    #[serde(default)]
    pub violations: Vec<Violation>,
    pub security_score: f64,
    pub complexity_score: f64,
}

impl ValidationReport {
    /// Violation messages joined for user-facing errors
    pub fn violation_summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// 0-100, higher is riskier
    pub risk_level: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub within_budget: bool,
}

/// Accepted IaC generation job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IacJob {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRef {
    pub deployment_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub success: bool,
}

/// Turns natural-language requirements into a blueprint
#[async_trait]
pub trait BlueprintService: Send + Sync {
    async fn generate(&self, requirements: &str, auto_fix: bool) -> ShipResult<BlueprintRef>;
}

/// Policy validation and automatic remediation
#[async_trait]
pub trait GuardrailService: Send + Sync {
    async fn validate(&self, blueprint_id: &str, auto_remediate: bool)
        -> ShipResult<ValidationReport>;

    async fn remediate(&self, blueprint_id: &str, violations: &[Violation]) -> ShipResult<()>;
}

#[async_trait]
pub trait RiskEngine: Send + Sync {
    async fn assess(&self, blueprint_id: &str, environment: &str) -> ShipResult<RiskAssessment>;
}

#[async_trait]
pub trait CostService: Send + Sync {
    async fn estimate(&self, blueprint_id: &str) -> ShipResult<CostEstimate>;
}

/// Deployment history lookups used by the prod promotion rule
#[async_trait]
pub trait StagingLookup: Send + Sync {
    /// Whether a completed staging deployment exists for the blueprint
    async fn has_successful_staging(&self, blueprint_id: &str) -> ShipResult<bool>;
}

#[async_trait]
pub trait IacGenerator: Send + Sync {
    async fn generate(&self, blueprint_id: &str) -> ShipResult<IacJob>;
}

/// Applies generated IaC and manages the resulting deployment
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn deploy(&self, iac_job_id: &str, auto_approve: bool) -> ShipResult<DeploymentRef>;

    async fn verify(&self, deployment_id: &str) -> ShipResult<VerificationReport>;

    async fn rollback(&self, deployment_id: &str, reason: &str) -> ShipResult<()>;
}

/// The full set of collaborators a pipeline needs
#[derive(Clone)]
pub struct Collaborators {
    pub blueprints: Arc<dyn BlueprintService>,
    pub guardrails: Arc<dyn GuardrailService>,
    pub risk: Arc<dyn RiskEngine>,
    pub costing: Arc<dyn CostService>,
    pub staging: Arc<dyn StagingLookup>,
    pub iac: Arc<dyn IacGenerator>,
    pub provisioner: Arc<dyn Provisioner>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
