// Shared fakes for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use cmdrelay::backend::{
    BackendError, ExecOptions, ExecutionBackend, ExecutionResult, FileListing, ListOrder, Result,
};
use cmdrelay::chat::{ChatClient, ChatError, ChatMessage, ChatReply};
use cmdrelay::config::Protocol;
use cmdrelay::limits::LimitConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    });
}

pub fn limits(max_input_chars: usize, max_output_chars: usize) -> LimitConfig {
    LimitConfig {
        max_input_chars,
        max_output_chars,
        max_session_duration_sec: 7200,
        max_session_idle_sec: 600,
        max_llm_cost_usd: None,
        allow_truncation: false,
    }
}

#[derive(Debug, Clone)]
pub enum Scripted {
    Output(ExecutionResult),
    ConnectionLost,
}

/// Records every call; `echo X` prints X, `false` exits 1, anything else exits 0
pub struct MockBackend {
    protocol: Protocol,
    streaming: bool,
    delay: Option<Duration>,
    script: Mutex<HashMap<String, Scripted>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            protocol: Protocol::Local,
            streaming: true,
            delay: None,
            script: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Behaves like a target that cannot stream
    pub fn ssm_like() -> Self {
        Self {
            protocol: Protocol::Ssm,
            streaming: false,
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn script(self, cmd: &str, outcome: Scripted) -> Self {
        self.script.lock().unwrap().insert(cmd.to_string(), outcome);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn execute_command(&self, cmd: &str, _opts: ExecOptions) -> Result<ExecutionResult> {
        self.record(cmd.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().unwrap().get(cmd).cloned();
        match scripted {
            Some(Scripted::Output(result)) => Ok(result),
            Some(Scripted::ConnectionLost) => Err(BackendError::ConnectionFailure {
                target: "mock".to_string(),
                message: "connection reset".to_string(),
            }),
            None if cmd == "false" => Ok(ExecutionResult::from_output(String::new(), String::new(), 1)),
            None => {
                let stdout = cmd
                    .strip_prefix("echo ")
                    .map(|s| format!("{}\n", s))
                    .unwrap_or_default();
                Ok(ExecutionResult::from_output(stdout, String::new(), 0))
            }
        }
    }

    async fn create_file(&self, path: &str, _content: &str, _backup: bool) -> Result<bool> {
        self.record(format!("create {}", path));
        Ok(true)
    }

    async fn update_file(&self, path: &str, _content: &str, _backup: bool) -> Result<bool> {
        self.record(format!("update {}", path));
        Ok(true)
    }

    async fn amend_file(&self, path: &str, _content: &str, _backup: bool) -> Result<bool> {
        self.record(format!("amend {}", path));
        Ok(true)
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        self.record(format!("remove {}", path));
        Ok(())
    }

    async fn list_files(
        &self,
        _dir: &str,
        limit: usize,
        offset: usize,
        _order: ListOrder,
    ) -> Result<FileListing> {
        Ok(FileListing::page(Vec::new(), limit, offset))
    }

    async fn present_working_directory(&self) -> Result<String> {
        Ok("/work".to_string())
    }
}

/// Chat client answering every request with the same content
pub struct MockChat {
    reply: std::result::Result<String, String>,
    pub requests: AtomicUsize,
}

impl MockChat {
    pub fn replying(content: &str) -> Self {
        Self {
            reply: Ok(content.to_string()),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatClient for MockChat {
    fn provider(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn chat(
        &self,
        model: Option<&str>,
        _messages: Vec<ChatMessage>,
    ) -> std::result::Result<ChatReply, ChatError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(content) => Ok(ChatReply {
                content: content.clone(),
                provider: "mock".to_string(),
                model: model.unwrap_or("mock-model").to_string(),
            }),
            Err(message) => Err(ChatError::ModelError(message.clone())),
        }
    }
}
