//! Errors surfaced at the orchestrator boundary.

use thiserror::Error;

use eightd_core::{CatalogError, ResponseError, SchemaError, StepStatus};

/// Why a submission was refused before any validator ran.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    #[error("Missing required fields: {}", .0.join("; "))]
    RequiredFields(Vec<String>),

    #[error("Cannot {action} a step in status '{status}'")]
    Status {
        action: &'static str,
        status: StepStatus,
    },
}

/// Errors from coaching and orchestration.
#[derive(Error, Debug)]
pub enum CoachError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(#[from] Precondition),

    #[error("Validation backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(#[from] ResponseError),

    #[error("No coaching content for '{0}'")]
    KnowledgeGap(String),

    #[error("Knowledge base error: {0}")]
    Knowledge(String),

    #[error("Storage error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CoachError {
    /// HTTP-equivalent status class for callers that expose the workflow.
    pub fn status_code(&self) -> u16 {
        match self {
            CoachError::NotFound(_) => 404,
            CoachError::InvalidInput(_) => 400,
            CoachError::PreconditionFailed(Precondition::RequiredFields(_)) => 422,
            CoachError::PreconditionFailed(Precondition::Status { .. }) => 409,
            CoachError::BackendUnavailable(_) => 503,
            CoachError::MalformedResponse(_) => 502,
            CoachError::KnowledgeGap(_) | CoachError::Knowledge(_) | CoachError::Store(_) => 500,
        }
    }

    /// Whether the caller can reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoachError::BackendUnavailable(_) | CoachError::MalformedResponse(_)
        )
    }

    pub(crate) fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CoachError::Store(Box::new(err))
    }
}

impl From<CatalogError> for CoachError {
    fn from(err: CatalogError) -> Self {
        CoachError::InvalidInput(err.to_string())
    }
}

impl From<SchemaError> for CoachError {
    fn from(err: SchemaError) -> Self {
        CoachError::InvalidInput(err.to_string())
    }
}
