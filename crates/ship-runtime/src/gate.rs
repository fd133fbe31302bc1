//! Approval Gate
//!
//! Decides whether a blueprint may proceed to provisioning without a human.
//! Inputs are fetched from the guardrail, risk, and cost collaborators, then
//! checked against the configured thresholds in a fixed order; the first
//! failing rule produces the denial reason.
//!
//! The gate never returns an error. Any failure while gathering inputs
//! becomes a denial carrying [`ApprovalConditions::worst_case`].

use futures::future::try_join3;
use ship_core::{
    ApprovalConditions, ApprovalDecision, ApprovalThresholds, Collaborators, CostService,
    GateRequest, GuardrailService, RiskEngine, ShipResult, StagingLookup,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Environment that requires automation level 3 and a prior staging success
pub const PRODUCTION: &str = "prod";

/// Lowest automation level allowed to auto-approve
pub const MIN_AUTO_APPROVE_LEVEL: u8 = 2;

/// Lowest automation level allowed to auto-approve into production
pub const MIN_PRODUCTION_LEVEL: u8 = 3;

#[derive(Clone)]
pub struct ApprovalGate {
    thresholds: ApprovalThresholds,
    guardrails: Arc<dyn GuardrailService>,
    risk: Arc<dyn RiskEngine>,
    costing: Arc<dyn CostService>,
    staging: Arc<dyn StagingLookup>,
}

impl ApprovalGate {
    pub fn new(thresholds: ApprovalThresholds, collaborators: &Collaborators) -> Self {
        Self {
            thresholds,
            guardrails: collaborators.guardrails.clone(),
            risk: collaborators.risk.clone(),
            costing: collaborators.costing.clone(),
            staging: collaborators.staging.clone(),
        }
    }

    pub fn thresholds(&self) -> &ApprovalThresholds {
        &self.thresholds
    }

    /// Evaluate `request` and return a verdict with the full condition snapshot
    pub async fn evaluate(&self, request: &GateRequest) -> ApprovalDecision {
        let conditions = match self.gather(request).await {
            Ok(c) => c,
            // Rule 1 needs no inputs, so it still decides the reason
            Err(e) if request.automation_level < MIN_AUTO_APPROVE_LEVEL => {
                warn!(
                    target_id = %request.target_id,
                    "Approval inputs unavailable for manual-approval request: {}",
                    e
                );
                return denied(
                    request,
                    manual_approval_reason(request.automation_level),
                    ApprovalConditions::worst_case(),
                );
            }
            Err(e) => return evaluation_failed(request, e),
        };

        if let Some(reason) = check_conditions(&self.thresholds, request, &conditions) {
            return denied(request, reason, conditions);
        }

        if request.environment == PRODUCTION {
            match self.staging.has_successful_staging(&request.target_id).await {
                Ok(true) => {}
                Ok(false) => {
                    return denied(
                        request,
                        "Production deployment requires a successful staging deployment"
                            .to_string(),
                        conditions,
                    )
                }
                Err(e) => return evaluation_failed(request, e),
            }
        }

        info!(
            target_id = %request.target_id,
            environment = %request.environment,
            "Auto-approval granted"
        );
        ApprovalDecision::approve(conditions)
    }

    async fn gather(&self, request: &GateRequest) -> ShipResult<ApprovalConditions> {
        let target = request.target_id.as_str();
        let (validation, risk, cost) = try_join3(
            self.guardrails.validate(target, false),
            self.risk.assess(target, &request.environment),
            self.costing.estimate(target),
        )
        .await?;

        let conditions = ApprovalConditions {
            guardrails_passed: validation.passed,
            security_score: validation.security_score,
            cost_within_budget: cost.within_budget,
            risk_level: risk.risk_level,
            complexity_score: validation.complexity_score,
        };
        debug!(target_id = %target, ?conditions, "Gathered approval conditions");
        Ok(conditions)
    }
}

/// Rules 1-6 and the production level check, in order. Returns the reason for
/// the first failing rule. The staging lookup is left to the caller since it
/// needs a collaborator.
pub fn check_conditions(
    thresholds: &ApprovalThresholds,
    request: &GateRequest,
    c: &ApprovalConditions,
) -> Option<String> {
    let level = request.automation_level;
    if level < MIN_AUTO_APPROVE_LEVEL {
        return Some(manual_approval_reason(level));
    }

    if !c.guardrails_passed {
        return Some("Guardrail validation did not pass".to_string());
    }

    let design = &thresholds.design;
    if c.security_score < design.min_security {
        return Some(format!(
            "Security score {} below threshold {}",
            c.security_score, design.min_security
        ));
    }
    if c.complexity_score > design.max_complexity {
        return Some(format!(
            "Complexity score {} exceeds threshold {}",
            c.complexity_score, design.max_complexity
        ));
    }

    if !c.cost_within_budget {
        return Some("Estimated cost exceeds budget".to_string());
    }

    if let Some(env) = thresholds.for_environment(&request.environment) {
        if c.security_score < env.min_security {
            return Some(format!(
                "Security score {} below {} threshold {}",
                c.security_score, request.environment, env.min_security
            ));
        }
        if c.risk_level > env.max_risk {
            return Some(format!(
                "Risk level {} exceeds {} threshold {}",
                c.risk_level, request.environment, env.max_risk
            ));
        }
    }

    if request.environment == PRODUCTION && level < MIN_PRODUCTION_LEVEL {
        return Some(format!(
            "Production deployment requires automation level {} or higher, got {}",
            MIN_PRODUCTION_LEVEL, level
        ));
    }

    None
}

fn manual_approval_reason(level: u8) -> String {
    format!("Automation level {} requires manual approval", level)
}

fn denied(request: &GateRequest, reason: String, conditions: ApprovalConditions) -> ApprovalDecision {
    info!(
        target_id = %request.target_id,
        environment = %request.environment,
        "Auto-approval denied: {}",
        reason
    );
    ApprovalDecision::deny(reason, conditions)
}

fn evaluation_failed(request: &GateRequest, err: ship_core::ShipError) -> ApprovalDecision {
    warn!(
        target_id = %request.target_id,
        environment = %request.environment,
        "Approval evaluation failed: {}",
        err
    );
    ApprovalDecision::deny(
        format!("Approval evaluation failed: {}", err),
        ApprovalConditions::worst_case(),
    )
}
