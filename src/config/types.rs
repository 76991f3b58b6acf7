// Configuration document types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub execution: ExecutionSection,
    pub security: SecuritySection,
    pub limits: LimitsSection,
    /// Interpreters and shells keyed by executor name
    pub executors: BTreeMap<String, ExecutorEntry>,
    /// Name of the profile whose session limits overlay `limits`
    pub active_profile: Option<String>,
    pub profiles: Vec<Profile>,
    pub llm: LlmSection,
    pub server: ServerSection,
    pub pager: PagerSection,
    pub sse: SseSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionSection::default(),
            security: SecuritySection::default(),
            limits: LimitsSection::default(),
            executors: default_executors(),
            active_profile: None,
            profiles: Vec::new(),
            llm: LlmSection::default(),
            server: ServerSection::default(),
            pager: PagerSection::default(),
            sse: SseSection::default(),
        }
    }
}

/// `execution.*`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    pub shell: ShellSection,
    /// Default command timeout in milliseconds (0 disables the timer)
    pub default_timeout_ms: u64,
    /// Default timeout for code execution
    pub code_timeout_ms: u64,
    /// Timeout for the local interpreter engine
    pub llm_timeout_ms: u64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            shell: ShellSection::default(),
            default_timeout_ms: 60_000,
            code_timeout_ms: 60_000,
            llm_timeout_ms: 120_000,
        }
    }
}

/// `execution.shell.*`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    pub enabled: bool,
    /// Shells a caller may request explicitly; empty allows any
    pub allowed: Vec<String>,
    /// Shell used when the caller does not request one
    pub default: Option<String>,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed: Vec::new(),
            default: None,
        }
    }
}

/// `security.*`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// Comma-separated deny patterns
    pub deny_command_regex: String,
    /// Comma-separated confirm patterns; empty selects the built-in list
    pub confirm_command_regex: String,
}

/// `limits.*`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub max_input_chars: usize,
    pub max_output_chars: usize,
    pub max_session_duration_sec: u64,
    pub max_session_idle_sec: u64,
    pub max_llm_cost_usd: Option<f64>,
    pub allow_truncation: bool,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_input_chars: 200_000,
            max_output_chars: 200_000,
            max_session_duration_sec: 7200,
            max_session_idle_sec: 600,
            max_llm_cost_usd: None,
            allow_truncation: false,
        }
    }
}

/// `executors.<name>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorEntry {
    #[serde(default)]
    pub enabled: bool,
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ExecutorEntry {
    pub fn new(enabled: bool, cmd: &str, args: &[&str]) -> Self {
        Self {
            enabled,
            cmd: cmd.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout_ms: None,
        }
    }
}

fn default_executors() -> BTreeMap<String, ExecutorEntry> {
    let mut executors = BTreeMap::new();
    executors.insert("bash".to_string(), ExecutorEntry::new(true, "bash", &[]));
    executors.insert("zsh".to_string(), ExecutorEntry::new(false, "zsh", &[]));
    executors.insert(
        "powershell".to_string(),
        ExecutorEntry::new(false, "pwsh", &["-NoProfile"]),
    );
    executors.insert("python".to_string(), ExecutorEntry::new(true, "python3", &[]));
    executors.insert(
        "typescript".to_string(),
        ExecutorEntry::new(false, "npx", &["-y", "ts-node@latest", "-T"]),
    );
    executors
}

/// `profiles[]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub session: Option<SessionLimits>,
}

/// `profiles[].session`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionLimits {
    pub max_input_chars: Option<usize>,
    pub max_output_chars: Option<usize>,
    /// Session duration in seconds
    pub max_duration: Option<u64>,
    /// Session idle time in seconds
    pub max_idle: Option<u64>,
}

/// `llm.*`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub enabled: bool,
    /// OpenAI-compatible base URL
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Provider label reported in plans
    pub provider: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
    pub auto_analyze_errors: bool,
    /// Local interpreter binary for the interpreter engine
    pub interpreter_bin: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:11434".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            provider: "openai".to_string(),
            max_retries: 3,
            retry_delay_ms: 1000,
            timeout_secs: 120,
            auto_analyze_errors: true,
            interpreter_bin: "interpreter".to_string(),
        }
    }
}

/// Execution target protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Local,
    Ssh,
    Ssm,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Local => write!(f, "local"),
            Protocol::Ssh => write!(f, "ssh"),
            Protocol::Ssm => write!(f, "ssm"),
        }
    }
}

/// `server.*` - the execution target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub protocol: Protocol,
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub identity_file: Option<PathBuf>,
    /// Directory commands run in when the caller gives none
    pub working_dir: Option<String>,
    /// Directory for ssh control sockets
    pub control_dir: Option<PathBuf>,
    pub instance_id: Option<String>,
    pub region: Option<String>,
    pub document_name: String,
    pub ssm_retries: u32,
    pub ssm_wait_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            protocol: Protocol::Local,
            host: "localhost".to_string(),
            port: None,
            username: None,
            identity_file: None,
            working_dir: None,
            control_dir: None,
            instance_id: None,
            region: None,
            document_name: "AWS-RunShellScript".to_string(),
            ssm_retries: 3,
            ssm_wait_ms: 5000,
        }
    }
}

/// `pager.*`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PagerSection {
    pub page_max_bytes: usize,
    pub cleanup_threshold_secs: u64,
}

impl Default for PagerSection {
    fn default() -> Self {
        Self {
            page_max_bytes: 4096,
            cleanup_threshold_secs: 3600,
        }
    }
}

/// `sse.*`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SseSection {
    pub heartbeat_ms: u64,
}

impl Default for SseSection {
    fn default() -> Self {
        Self {
            heartbeat_ms: 15_000,
        }
    }
}
