// Request and response bodies for the command service

use crate::backend::ExecutionResult;
use crate::chat::ErrorAnalysis;
use crate::plan::{PlanOutcome, PlanStream};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `execute-shell` body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShellRequest {
    pub command: String,
    /// Literal arguments, quoted onto the command
    pub args: Vec<String>,
    pub shell: Option<String>,
    pub timeout_ms: Option<u64>,
    pub cwd: Option<String>,
}

impl ShellRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }
}

/// `execute-code` body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeRequest {
    pub code: String,
    pub language: String,
    pub timeout_ms: Option<u64>,
}

/// `execute-<name>` body; shells read `command`, interpreters read `code`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DynamicRequest {
    pub command: String,
    pub code: String,
    pub args: Vec<String>,
    pub timeout_ms: Option<u64>,
}

/// Result of a shell or code execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    /// Clipped output; the first page when `response_id` is set
    #[serde(flatten)]
    pub result: ExecutionResult,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ai_analysis: Option<ErrorAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub interpreter: Option<String>,
}

/// Result of an execute-llm request
pub enum LlmResponse {
    Completed {
        outcome: PlanOutcome,
        /// Raw interpreter output for the interpreter engine
        engine_output: Option<ExecutionResult>,
    },
    Streaming(PlanStream),
}
