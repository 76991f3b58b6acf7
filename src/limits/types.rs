// Limit types

use serde::{Deserialize, Serialize};

/// Read-only limit snapshot for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitConfig {
    pub max_input_chars: usize,
    pub max_output_chars: usize,
    pub max_session_duration_sec: u64,
    pub max_session_idle_sec: u64,
    pub max_llm_cost_usd: Option<f64>,
    pub allow_truncation: bool,
}

/// Client-visible diagnostics for a rejected input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedInput {
    pub error: String,
    pub truncated: bool,
    /// First `max_input_chars` characters of the input
    pub stdout: String,
    pub kind: String,
    pub max_input_chars: usize,
    pub input_chars: usize,
}

/// Outcome of the input circuit breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCheck {
    Accepted,
    Truncated { value: String },
    Rejected { payload: RejectedInput },
}

impl InputCheck {
    pub fn is_ok(&self) -> bool {
        !matches!(self, InputCheck::Rejected { .. })
    }

    /// The input to use downstream, or the rejection payload
    pub fn into_value(self, original: &str) -> Result<String, RejectedInput> {
        match self {
            InputCheck::Accepted => Ok(original.to_string()),
            InputCheck::Truncated { value } => Ok(value),
            InputCheck::Rejected { payload } => Err(payload),
        }
    }
}

/// Output after the output clipper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClippedOutput {
    pub stdout: String,
    pub stderr: String,
    pub truncated: bool,
}
