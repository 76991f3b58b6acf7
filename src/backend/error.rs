// Error types for Backend module

use crate::config::Protocol;
use thiserror::Error;

/// Backend execution errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Shell '{requested}' is unavailable and fallback '{fallback}' is unavailable too")]
    ShellUnavailable { requested: String, fallback: String },

    #[error("Shell '{0}' is not in the allowed shell list")]
    ShellNotAllowed(String),

    #[error("Execution timed out before the command completed")]
    ExecutionTimeout,

    #[error("Command exited with code {exit_code}")]
    NonZeroExit {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Connection to {target} failed: {message}")]
    ConnectionFailure { target: String, message: String },

    #[error("Streaming is not supported for the {0} protocol")]
    StreamingUnsupported(Protocol),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File operation on {path} failed: {message}")]
    FileOperation { path: String, message: String },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    /// Connection failures abort a whole plan; everything else is per-step
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, BackendError::ConnectionFailure { .. })
    }

    pub(crate) fn file_op(path: &str, message: impl Into<String>) -> Self {
        BackendError::FileOperation {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for Backend operations
pub type Result<T> = std::result::Result<T, BackendError>;
