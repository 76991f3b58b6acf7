// Error types for Registry module

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Executor '{0}' not found")]
    NotFound(String),

    #[error("Executor '{0}' is disabled")]
    Disabled(String),

    #[error("Invalid executor: {0}")]
    Invalid(String),
}
