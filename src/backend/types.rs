// Backend types

use super::error::BackendError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Outcome of one backend call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Set for non-zero exits and soft timeouts
    pub error: bool,
    /// Output was clipped by the limit enforcer
    pub truncated: bool,
    /// Output budget was exhausted and the run stopped early
    pub terminated: bool,
    /// Soft timeout fired before the command completed
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn from_output(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            error: exit_code != 0,
            ..Default::default()
        }
    }

    /// Result for a timer win: whatever was read so far, exit code -1
    pub fn timed_out(stdout: String, stderr: String) -> Self {
        Self {
            stdout,
            stderr,
            exit_code: -1,
            error: true,
            timed_out: true,
            ..Default::default()
        }
    }

    /// Failed step carrying an error message in stderr
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            stderr: message.into(),
            exit_code: -1,
            error: true,
            ..Default::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.error && !self.timed_out
    }

    /// Convert into the error taxonomy for callers that want exceptions
    pub fn check(self) -> Result<Self, BackendError> {
        if self.timed_out {
            return Err(BackendError::ExecutionTimeout);
        }
        if self.exit_code != 0 {
            return Err(BackendError::NonZeroExit {
                exit_code: self.exit_code,
                stdout: self.stdout,
                stderr: self.stderr,
            });
        }
        Ok(self)
    }
}

/// Optional arguments to `execute_command`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// 0 or `None` means no timer
    pub timeout_ms: Option<u64>,
    pub cwd: Option<String>,
    pub shell: Option<String>,
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    /// Effective timeout, `None` when disabled
    pub fn effective_timeout(&self) -> Option<u64> {
        self.timeout_ms.filter(|ms| *ms > 0)
    }
}

/// Sort key for directory listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListOrder {
    #[default]
    Name,
    Mtime,
    Size,
}

impl FromStr for ListOrder {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "name" => Ok(ListOrder::Name),
            "mtime" | "time" | "modified" => Ok(ListOrder::Mtime),
            "size" => Ok(ListOrder::Size),
            other => Err(BackendError::InvalidInput(format!(
                "unknown order '{}', expected name|mtime|size",
                other
            ))),
        }
    }
}

/// One page of a directory listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListing {
    pub items: Vec<String>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl FileListing {
    /// Slice a full, already ordered listing
    pub fn page(all: Vec<String>, limit: usize, offset: usize) -> Self {
        let total = all.len();
        let items = all.into_iter().skip(offset).take(limit).collect();
        Self {
            items,
            total,
            limit,
            offset,
        }
    }
}
