//! Approval gate types
//!
//! The gate itself lives in `ship-runtime`; these are the values it consumes
//! and produces so they can be stored in step records and served over the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the gate is asked to approve
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GateRequest {
    /// Blueprint being promoted
    pub target_id: String,
    pub environment: String,
    pub automation_level: u8,
}

impl GateRequest {
    pub fn new(target_id: impl Into<String>, environment: impl Into<String>, automation_level: u8) -> Self {
        Self {
            target_id: target_id.into(),
            environment: environment.into(),
            automation_level,
        }
    }
}

/// Raw values the gate evaluated, kept for audit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalConditions {
    pub guardrails_passed: bool,
    /// 0-100, higher is safer
    pub security_score: f64,
    pub cost_within_budget: bool,
    /// 0-100, higher is riskier
    pub risk_level: f64,
    /// 0-100, higher is more complex
    pub complexity_score: f64,
}

impl ApprovalConditions {
    /// Values used when inputs could not be gathered
    pub fn worst_case() -> Self {
        Self {
            guardrails_passed: false,
            security_score: 0.0,
            cost_within_budget: false,
            risk_level: 100.0,
            complexity_score: 100.0,
        }
    }
}

/// Gate verdict
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDecision {
    pub approved: bool,

    /// Present iff `approved` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    pub conditions: ApprovalConditions,

    pub evaluated_at: DateTime<Utc>,
}

impl ApprovalDecision {
    pub fn approve(conditions: ApprovalConditions) -> Self {
        Self {
            approved: true,
            reason: None,
            conditions,
            evaluated_at: Utc::now(),
        }
    }

    pub fn deny(reason: impl Into<String>, conditions: ApprovalConditions) -> Self {
        Self {
            approved: false,
            reason: Some(reason.into()),
            conditions,
            evaluated_at: Utc::now(),
        }
    }

    /// Reason text, empty for approvals
    pub fn reason_or_empty(&self) -> &str {
        self.reason.as_deref().unwrap_or("")
    }
}
