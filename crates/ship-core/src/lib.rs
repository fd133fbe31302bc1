// Ship Core - Foundation types and traits for the ship deployment orchestrator
//
// Workflow state, approval gate values, collaborator interfaces, the workflow
// store abstraction, and the YAML configuration document.

pub mod approval;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod store;
pub mod workflow;

// Re-export core types
pub use approval::{ApprovalConditions, ApprovalDecision, GateRequest};
pub use collaborator::{
    BlueprintRef, BlueprintService, Collaborators, CostEstimate, CostService, DeploymentRef,
    GuardrailService, IacGenerator, IacJob, Provisioner, RiskAssessment, RiskEngine,
    StagingLookup, ValidationReport, VerificationReport, Violation,
};
pub use config::{
    ApprovalThresholds, DesignThresholds, EnvironmentThresholds, RuntimeConfig, ServerConfig,
    ServicesConfig, ShipConfig, StoreConfig,
};
pub use error::{ShipError, ShipResult};
pub use store::{Mutation, WorkflowFilter, WorkflowStore, DEFAULT_LIST_LIMIT};
pub use workflow::{
    DeployResult, DesignResult, GenerateResult, Stage, StageResult, StepRecord, StepStatus,
    ValidateResult, VerifyResult, Workflow, WorkflowId, WorkflowParams, WorkflowStatus,
    COMPLETED_MESSAGE,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
