// Ship Runtime - Pipeline execution for the ship deployment orchestrator
//
// Provides the approval gate, the per-stage executor, and the workflow
// orchestrator that spawns and tracks pipeline tasks.

pub mod events;
pub mod executor;
pub mod gate;
pub mod orchestrator;

pub use events::{EventSink, WorkflowEvent};
pub use executor::StageExecutor;
pub use gate::{check_conditions, ApprovalGate};
pub use orchestrator::{WorkflowOrchestrator, ROLLBACK_REASON};

/// Runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
