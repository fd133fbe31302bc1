//! Error types shared by every ship crate

use thiserror::Error;

use crate::workflow::Stage;

/// Result alias used throughout the workspace
pub type ShipResult<T> = Result<T, ShipError>;

/// Errors raised by the orchestrator, its store, and its collaborators
#[derive(Debug, Error)]
pub enum ShipError {
    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A workflow request was missing required fields
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The workflow store could not complete an operation
    #[error("store error: {0}")]
    Store(String),

    /// No workflow exists with the given identifier
    #[error("workflow '{0}' not found")]
    NotFound(String),

    /// A remote collaborator call errored or returned an unusable response
    #[error("{service} call failed: {message}")]
    Collaborator { service: String, message: String },

    /// A pipeline stage failed terminally; the message is user-facing
    #[error("{message}")]
    Stage { stage: Stage, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShipError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn collaborator(service: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Collaborator {
            service: service.into(),
            message: msg.into(),
        }
    }

    pub fn stage(stage: Stage, msg: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            message: msg.into(),
        }
    }

    /// Stage that raised this error, if it is a terminal stage failure
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_displays_bare_message() {
        let err = ShipError::stage(Stage::Verify, "verification failed, rolled back");
        assert_eq!(err.to_string(), "verification failed, rolled back");
        assert_eq!(err.failed_stage(), Some(Stage::Verify));
    }

    #[test]
    fn test_collaborator_error_names_service() {
        let err = ShipError::collaborator("iac-generator", "HTTP 503: unavailable");
        assert_eq!(err.to_string(), "iac-generator call failed: HTTP 503: unavailable");
        assert!(err.failed_stage().is_none());
    }
}
