// Error types for Plan module

use crate::backend::BackendError;
use crate::chat::ChatError;
use crate::config::Protocol;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Streaming is not supported for the {0} protocol")]
    StreamingUnsupported(Protocol),

    #[error("Streaming is not supported for the {0} engine")]
    EngineStreamingUnsupported(String),

    #[error("Plan generation failed: {0}")]
    Chat(#[from] ChatError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}
