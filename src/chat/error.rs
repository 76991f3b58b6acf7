// Error types for Chat module

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("LLM is not configured")]
    NotConfigured,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("Exhausted: max retries ({retries}) exceeded, last error: {last_error}")]
    Exhausted { retries: u32, last_error: String },

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Model returned no choices")]
    EmptyResponse,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ChatError {
    /// Auth and request errors will not improve on retry
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ChatError::NotConfigured
                | ChatError::AuthenticationFailed(_)
                | ChatError::InvalidRequest(_)
                | ChatError::InsufficientBalance(_)
        )
    }
}
