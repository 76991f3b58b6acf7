// Input admission and proportional output clipping

use super::types::{ClippedOutput, InputCheck, LimitConfig, RejectedInput};
use tracing::{info, warn};

/// Longest prefix of `s` holding at most `n` characters
pub fn prefix_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Size-based circuit breaker over one limit snapshot
#[derive(Debug, Clone)]
pub struct LimitEnforcer {
    limits: LimitConfig,
}

impl LimitEnforcer {
    pub fn new(limits: LimitConfig) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &LimitConfig {
        &self.limits
    }

    /// Admit, truncate or reject an input of the given kind
    pub fn enforce_input_limit(&self, kind: &str, input: &str) -> InputCheck {
        if input.is_empty() {
            return InputCheck::Accepted;
        }

        let max = self.limits.max_input_chars;
        let length = input.chars().count();
        if length <= max {
            return InputCheck::Accepted;
        }

        let preview = prefix_chars(input, max).to_string();
        if self.limits.allow_truncation {
            info!(kind = kind, input_chars = length, max_input_chars = max, "input truncated");
            return InputCheck::Truncated { value: preview };
        }

        warn!(kind = kind, input_chars = length, max_input_chars = max, "input rejected");
        InputCheck::Rejected {
            payload: RejectedInput {
                error: "Input exceeded limit".to_string(),
                truncated: true,
                stdout: preview,
                kind: kind.to_string(),
                max_input_chars: max,
                input_chars: length,
            },
        }
    }

    /// Clip combined output to `max_output_chars`, splitting the budget by share
    pub fn clip_output(&self, stdout: &str, stderr: &str) -> ClippedOutput {
        clip_to(stdout, stderr, self.limits.max_output_chars)
    }
}

/// Proportional clip against an explicit budget
pub fn clip_to(stdout: &str, stderr: &str, max: usize) -> ClippedOutput {
    let out_len = stdout.chars().count();
    let err_len = stderr.chars().count();
    let total = out_len + err_len;

    if total <= max {
        return ClippedOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            truncated: false,
        };
    }

    let out_budget = ((max as u128 * out_len as u128) / total as u128) as usize;
    let err_budget = max - out_budget;

    ClippedOutput {
        stdout: prefix_chars(stdout, out_budget).to_string(),
        stderr: prefix_chars(stderr, err_budget).to_string(),
        truncated: true,
    }
}
