// Error types for Policy module

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Invalid command pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
