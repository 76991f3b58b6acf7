// Registry types

use crate::config::ExecutorEntry;
use serde::{Deserialize, Serialize};

/// Names routed as shells; everything else is a code interpreter
pub const SHELL_EXECUTORS: &[&str] = &["bash", "zsh", "sh", "powershell", "pwsh"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    Shell,
    Code,
}

impl ExecutorKind {
    pub fn classify(name: &str) -> Self {
        if SHELL_EXECUTORS.iter().any(|s| s.eq_ignore_ascii_case(name)) {
            ExecutorKind::Shell
        } else {
            ExecutorKind::Code
        }
    }
}

/// One configured interpreter or shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorInfo {
    pub name: String,
    pub enabled: bool,
    pub cmd: String,
    pub args: Vec<String>,
    pub kind: ExecutorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ExecutorInfo {
    pub fn from_entry(name: &str, entry: &ExecutorEntry) -> Self {
        Self {
            name: name.to_string(),
            enabled: entry.enabled,
            cmd: entry.cmd.clone(),
            args: entry.args.clone(),
            kind: ExecutorKind::classify(name),
            timeout_ms: entry.timeout_ms,
        }
    }

    pub fn to_entry(&self) -> ExecutorEntry {
        ExecutorEntry {
            enabled: self.enabled,
            cmd: self.cmd.clone(),
            args: self.args.clone(),
            timeout_ms: self.timeout_ms,
        }
    }
}

/// Where a dynamic `execute-<name>` request goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorRoute {
    Shell {
        name: String,
        shell: String,
        timeout_ms: Option<u64>,
    },
    Code {
        name: String,
        language: String,
        interpreter: String,
        args: Vec<String>,
        timeout_ms: Option<u64>,
    },
}
