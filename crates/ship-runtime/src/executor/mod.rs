// Executor module - stage execution for workflow pipelines

pub mod stage;

pub use stage::StageExecutor;
