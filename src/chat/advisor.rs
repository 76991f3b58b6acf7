// Failure advisor: asks the chat model why a step failed

use super::{ChatClient, ChatMessage};
use crate::limits::prefix_chars;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const STDOUT_CONTEXT_CHARS: usize = 2000;
const STDERR_CONTEXT_CHARS: usize = 8000;

const ADVISOR_PROMPT: &str = "You are an experienced devops and software engineer. \
Read the failure output and give short, actionable fixes: commands, config changes or code. \
Focus on the root cause.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Command,
    Code,
    File,
}

/// What failed and what it printed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    pub kind: FailureKind,
    /// Command line, code snippet or file name
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

impl AnalysisContext {
    pub fn command(input: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            kind: FailureKind::Command,
            input: input.to_string(),
            language: None,
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            cwd: None,
        }
    }
}

/// Model commentary attached to a failed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    pub model: String,
    pub text: String,
}

/// Hook run after a failed step; `None` means no annotation
#[async_trait]
pub trait StepAnalyzer: Send + Sync {
    async fn analyze(&self, ctx: &AnalysisContext) -> Option<ErrorAnalysis>;
}

/// Analyzer used when no LLM is configured
pub struct NoAnalysis;

#[async_trait]
impl StepAnalyzer for NoAnalysis {
    async fn analyze(&self, _ctx: &AnalysisContext) -> Option<ErrorAnalysis> {
        None
    }
}

fn clip_context(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        format!("{}\n... (truncated)", prefix_chars(text, max))
    }
}

pub struct ErrorAdvisor {
    client: Arc<dyn ChatClient>,
    enabled: bool,
    model: Option<String>,
}

impl ErrorAdvisor {
    pub fn new(client: Arc<dyn ChatClient>, enabled: bool) -> Self {
        Self {
            client,
            enabled,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// User message: the failure as JSON with clipped output
    pub fn build_request(ctx: &AnalysisContext) -> String {
        serde_json::json!({
            "task": "Analyze failure and propose fixes",
            "context": ctx.kind,
            "input": ctx.input,
            "language": ctx.language,
            "exitCode": ctx.exit_code,
            "stderr": clip_context(&ctx.stderr, STDERR_CONTEXT_CHARS),
            "stdout": clip_context(&ctx.stdout, STDOUT_CONTEXT_CHARS),
            "cwd": ctx.cwd,
        })
        .to_string()
    }
}

#[async_trait]
impl StepAnalyzer for ErrorAdvisor {
    async fn analyze(&self, ctx: &AnalysisContext) -> Option<ErrorAnalysis> {
        if !self.enabled {
            return None;
        }

        let messages = vec![
            ChatMessage::system(ADVISOR_PROMPT),
            ChatMessage::user(Self::build_request(ctx)),
        ];
        match self.client.chat(self.model.as_deref(), messages).await {
            Ok(reply) => {
                debug!(model = %reply.model, chars = reply.content.len(), "failure analysis received");
                Some(ErrorAnalysis {
                    model: reply.model,
                    text: reply.content,
                })
            }
            Err(e) => {
                warn!(error = %e, input = %ctx.input, "failure analysis unavailable");
                None
            }
        }
    }
}
