// Error types for Service module

use crate::backend::BackendError;
use crate::limits::{LimitError, RejectedInput};
use crate::pager::PagerError;
use crate::plan::PlanError;
use crate::policy::SafetyDecision;
use crate::registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Input exceeded limit ({} chars > {})", .0.input_chars, .0.max_input_chars)]
    InputRejected(RejectedInput),

    #[error("Shell '{0}' is disabled")]
    ShellDisabled(String),

    #[error("Command blocked by policy")]
    PolicyBlocked(SafetyDecision),

    #[error("LLM execution is not configured")]
    LlmNotConfigured,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Limit(#[from] LimitError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Pager(#[from] PagerError),
}

fn backend_status(e: &BackendError) -> u16 {
    match e {
        BackendError::ShellNotAllowed(_) => 403,
        BackendError::ShellUnavailable { .. }
        | BackendError::InvalidInput(_)
        | BackendError::FileOperation { .. } => 400,
        BackendError::ConnectionFailure { .. } => 502,
        BackendError::StreamingUnsupported(_) => 501,
        _ => 500,
    }
}

impl ServiceError {
    /// HTTP status the collaborator should answer with
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 400,
            ServiceError::InputRejected(_) => 413,
            ServiceError::ShellDisabled(_) | ServiceError::PolicyBlocked(_) => 403,
            ServiceError::LlmNotConfigured => 409,
            ServiceError::Registry(RegistryError::NotFound(_)) => 404,
            ServiceError::Registry(RegistryError::Disabled(_)) => 409,
            ServiceError::Registry(RegistryError::Invalid(_)) => 400,
            ServiceError::Limit(_) => 402,
            ServiceError::Plan(PlanError::StreamingUnsupported(_))
            | ServiceError::Plan(PlanError::EngineStreamingUnsupported(_)) => 501,
            ServiceError::Plan(PlanError::Chat(_)) => 502,
            ServiceError::Plan(PlanError::Backend(e)) | ServiceError::Backend(e) => backend_status(e),
            ServiceError::Pager(PagerError::NotFound(_)) => 404,
            ServiceError::Pager(PagerError::OutOfBounds { .. }) => 400,
        }
    }
}
