// Service module - request handling core shared by the binary and HTTP collaborators

pub mod command;
pub mod error;
pub mod types;

pub use command::{CodeRuntime, CommandService, SUPPORTED_LANGUAGES, code_runtime};
pub use error::ServiceError;
pub use types::{CodeRequest, CommandResponse, DynamicRequest, LlmResponse, ShellRequest};
