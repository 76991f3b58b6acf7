// Chat client - HTTP communication with an OpenAI-compatible endpoint

use super::types::{CompletionRequest, CompletionResponse};
use super::{ChatClient, ChatConfig, ChatError, ChatMessage, ChatReply};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Longest backoff between attempts
const MAX_RETRY_DELAY_MS: u64 = 30_000;

#[derive(Clone)]
pub struct HttpChatClient {
    config: ChatConfig,
    client: Client,
}

impl HttpChatClient {
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        info!(
            endpoint = %config.endpoint,
            model = %config.default_model,
            timeout_secs = config.request_timeout_secs,
            max_retries = config.max_retries,
            "initializing chat client"
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Backoff before retry number `retry` (1-based)
    pub fn retry_delay(&self, retry: u32) -> Duration {
        let multiplier = 2u64.saturating_pow(retry.saturating_sub(1));
        let delay_ms = self.config.base_retry_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(delay_ms.min(MAX_RETRY_DELAY_MS))
    }

    async fn send_request(&self, request: &CompletionRequest) -> Result<CompletionResponse, ChatError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        debug!(url = %url, "sending HTTP request");

        let mut builder = self.client.post(&url).json(request);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        debug!(status = status.as_u16(), "received HTTP response");

        if status.is_success() {
            let body = response.text().await?;
            debug!(
                response_preview = %body.chars().take(200).collect::<String>(),
                "response body received"
            );
            return Ok(serde_json::from_str(&body)?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 | 403 => ChatError::AuthenticationFailed(body),
            400 => ChatError::InvalidRequest(body),
            402 => ChatError::InsufficientBalance(body),
            _ if status.is_server_error() => ChatError::ModelError(body),
            _ => ChatError::ModelError(format!("HTTP {}: {}", status, body)),
        })
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    fn provider(&self) -> &str {
        &self.config.provider
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    async fn chat(&self, model: Option<&str>, messages: Vec<ChatMessage>) -> Result<ChatReply, ChatError> {
        let request = CompletionRequest {
            model: model.unwrap_or(&self.config.default_model).to_string(),
            messages,
            temperature: None,
            stream: false,
        };

        info!(
            model = %request.model,
            messages_count = request.messages.len(),
            "starting chat completion"
        );

        let start = Instant::now();
        let mut retries = 0;
        let max_retries = self.config.max_retries;

        loop {
            debug!(retry = retries, "sending chat request");
            match self.send_request(&request).await {
                Ok(response) => {
                    let (prompt_tokens, completion_tokens) = response
                        .usage
                        .as_ref()
                        .map(|u| (u.prompt_tokens, u.completion_tokens))
                        .unwrap_or((0, 0));
                    let content = response
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.message.content)
                        .ok_or(ChatError::EmptyResponse)?;

                    info!(
                        model = %request.model,
                        prompt_tokens,
                        completion_tokens,
                        latency_ms = start.elapsed().as_millis() as u64,
                        retries,
                        "chat completion succeeded"
                    );
                    return Ok(ChatReply {
                        content,
                        provider: self.config.provider.clone(),
                        model: response.model.unwrap_or_else(|| request.model.clone()),
                    });
                }
                Err(e) if !e.is_retryable() => {
                    error!(error = %e, "chat completion failed");
                    return Err(e);
                }
                Err(e) => {
                    retries += 1;
                    if retries > max_retries {
                        error!(
                            retries,
                            total_latency_ms = start.elapsed().as_millis() as u64,
                            error = %e,
                            "chat completion failed: exhausted retries"
                        );
                        return Err(ChatError::Exhausted {
                            retries,
                            last_error: e.to_string(),
                        });
                    }

                    let delay = self.retry_delay(retries);
                    warn!(
                        retry = retries,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "chat completion failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
