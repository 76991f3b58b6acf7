// Chat module - LLM chat-completion client and failure advisor

pub mod advisor;
pub mod client;
pub mod error;
pub mod types;

pub use advisor::{AnalysisContext, ErrorAdvisor, ErrorAnalysis, FailureKind, NoAnalysis, StepAnalyzer};
pub use client::HttpChatClient;
pub use error::ChatError;
pub use types::{ChatMessage, ChatReply, ChatRole};

use crate::config::LlmSection;
use async_trait::async_trait;

/// Chat client configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// OpenAI-compatible base URL
    pub endpoint: String,
    pub api_key: Option<String>,
    pub default_model: String,
    /// Provider label reported back in replies
    pub provider: String,
    pub max_retries: u32,
    /// Base retry delay in milliseconds
    pub base_retry_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl ChatConfig {
    pub fn from_section(llm: &LlmSection) -> Self {
        Self {
            endpoint: llm.endpoint.clone(),
            api_key: llm.api_key.clone(),
            default_model: llm.model.clone(),
            provider: llm.provider.clone(),
            max_retries: llm.max_retries,
            base_retry_delay_ms: llm.retry_delay_ms,
            request_timeout_secs: llm.timeout_secs,
        }
    }
}

/// Opaque chat function; mocks implement this in tests
#[async_trait]
pub trait ChatClient: Send + Sync {
    fn provider(&self) -> &str;

    fn default_model(&self) -> &str;

    /// Send `messages`; `model = None` uses the default model
    async fn chat(&self, model: Option<&str>, messages: Vec<ChatMessage>) -> Result<ChatReply, ChatError>;
}
