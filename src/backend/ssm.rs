// SSM backend driving the aws CLI run-command API

use super::error::{BackendError, Result};
use super::files::{WriteMode, remote_list_script, remote_write_script};
use super::process::{TimeoutAction, run_captured};
use super::shell::{check_allowed, quote, validate_shell_name};
use super::ssh::remote_command;
use super::types::{ExecOptions, ExecutionResult, FileListing, ListOrder};
use super::ExecutionBackend;
use crate::config::{AppConfig, Protocol};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Upper bound for a single aws CLI call
const AWS_CALL_TIMEOUT: Duration = Duration::from_secs(60);

const MISSING_FILE_EXIT: i32 = 3;

/// Managed instance addressed through SSM
#[derive(Debug, Clone)]
pub struct SsmTarget {
    pub instance_id: String,
    pub region: Option<String>,
    pub document_name: String,
    /// Minimum number of status polls
    pub retries: u32,
    pub wait_ms: u64,
}

impl SsmTarget {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            region: None,
            document_name: "AWS-RunShellScript".to_string(),
            retries: 3,
            wait_ms: 5000,
        }
    }

    fn is_powershell(&self) -> bool {
        self.document_name.to_ascii_lowercase().contains("powershell")
    }

    /// Number of polls: enough to cover the timeout, never fewer than `retries`
    pub fn poll_attempts(&self, timeout_ms: Option<u64>) -> u32 {
        let wait = self.wait_ms.max(1);
        let by_timeout = timeout_ms
            .map(|ms| ms.div_ceil(wait).min(u32::MAX as u64) as u32)
            .unwrap_or(0);
        self.retries.max(by_timeout).max(1)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendCommandOutput {
    command: SentCommand,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SentCommand {
    command_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Invocation {
    status: String,
    #[serde(default)]
    response_code: Option<i32>,
    #[serde(default)]
    standard_output_content: Option<String>,
    #[serde(default)]
    standard_error_content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InvocationState {
    Running,
    Finished,
    TimedOut,
}

fn classify_status(status: &str) -> InvocationState {
    match status {
        "Pending" | "InProgress" | "Delayed" => InvocationState::Running,
        "TimedOut" | "DeliveryTimedOut" | "ExecutionTimedOut" => InvocationState::TimedOut,
        _ => InvocationState::Finished,
    }
}

pub struct SsmBackend {
    target: SsmTarget,
    allowed_shells: Vec<String>,
    working_dir: Option<String>,
}

impl SsmBackend {
    pub fn new(target: SsmTarget, allowed_shells: Vec<String>) -> Self {
        Self {
            target,
            allowed_shells,
            working_dir: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let server = &config.server;
        let instance_id = server.instance_id.clone().ok_or_else(|| {
            BackendError::InvalidInput("server.instance_id is required for ssm".into())
        })?;
        let mut target = SsmTarget::new(instance_id);
        target.region = server.region.clone();
        target.document_name = server.document_name.clone();
        target.retries = server.ssm_retries;
        target.wait_ms = server.ssm_wait_ms;

        let mut backend = Self::new(target, config.execution.shell.allowed.clone());
        backend.working_dir = server.working_dir.clone();
        Ok(backend)
    }

    fn connection_failure(&self, message: impl Into<String>) -> BackendError {
        BackendError::ConnectionFailure {
            target: self.target.instance_id.clone(),
            message: message.into(),
        }
    }

    /// Run one aws CLI call and return its stdout; CLI failures come back as stderr
    async fn aws(&self, args: &[String]) -> Result<std::result::Result<String, String>> {
        let mut cmd = Command::new("aws");
        cmd.args(args).args(["--output", "json"]);
        if let Some(region) = &self.target.region {
            cmd.args(["--region", region.as_str()]);
        }

        let captured = match run_captured(cmd, None, Some(AWS_CALL_TIMEOUT), TimeoutAction::Kill).await
        {
            Ok(c) => c,
            Err(BackendError::Spawn { source, .. }) => {
                return Err(self.connection_failure(format!("aws cli unavailable: {}", source)));
            }
            Err(e) => return Err(e),
        };

        match captured.exit_code {
            Some(0) => Ok(Ok(captured.stdout)),
            Some(_) => Ok(Err(captured.stderr.trim().to_string())),
            None => Err(self.connection_failure("aws cli call timed out")),
        }
    }

    fn script_for(&self, cmd: &str, cwd: Option<&str>, shell: Option<&str>) -> String {
        if self.target.is_powershell() {
            match cwd {
                Some(dir) => format!("Set-Location -Path {}; {}", quote(dir), cmd),
                None => cmd.to_string(),
            }
        } else {
            remote_command(cmd, cwd, shell)
        }
    }

    /// Send `script` and poll until a terminal status or the attempts run out
    async fn run_script(&self, script: &str, timeout_ms: Option<u64>) -> Result<ExecutionResult> {
        let mut parameters = serde_json::json!({ "commands": [script] });
        if let Some(ms) = timeout_ms {
            parameters["executionTimeout"] = serde_json::json!([ms.div_ceil(1000).max(1).to_string()]);
        }

        let send_args = vec![
            "ssm".to_string(),
            "send-command".to_string(),
            "--instance-ids".to_string(),
            self.target.instance_id.clone(),
            "--document-name".to_string(),
            self.target.document_name.clone(),
            "--parameters".to_string(),
            parameters.to_string(),
        ];
        let sent: SendCommandOutput = match self.aws(&send_args).await? {
            Ok(stdout) => serde_json::from_str(&stdout)?,
            Err(stderr) => return Err(self.connection_failure(stderr)),
        };
        let command_id = sent.command.command_id;
        debug!(instance = %self.target.instance_id, command_id = %command_id, "ssm command sent");

        let get_args = vec![
            "ssm".to_string(),
            "get-command-invocation".to_string(),
            "--command-id".to_string(),
            command_id.clone(),
            "--instance-id".to_string(),
            self.target.instance_id.clone(),
        ];

        let attempts = self.target.poll_attempts(timeout_ms);
        let mut last: Option<Invocation> = None;
        for attempt in 1..=attempts {
            tokio::time::sleep(Duration::from_millis(self.target.wait_ms)).await;

            let invocation: Invocation = match self.aws(&get_args).await? {
                Ok(stdout) => serde_json::from_str(&stdout)?,
                Err(stderr) if stderr.contains("InvocationDoesNotExist") => {
                    debug!(command_id = %command_id, attempt, "invocation not registered yet");
                    continue;
                }
                Err(stderr) => return Err(self.connection_failure(stderr)),
            };

            match classify_status(&invocation.status) {
                InvocationState::Running => {
                    debug!(command_id = %command_id, attempt, status = %invocation.status, "ssm command running");
                    last = Some(invocation);
                }
                InvocationState::TimedOut => {
                    return Ok(ExecutionResult::timed_out(
                        invocation.standard_output_content.unwrap_or_default(),
                        invocation.standard_error_content.unwrap_or_default(),
                    ));
                }
                InvocationState::Finished => {
                    let code = match invocation.response_code {
                        Some(code) if code >= 0 => code,
                        _ if invocation.status == "Success" => 0,
                        _ => 1,
                    };
                    return Ok(ExecutionResult::from_output(
                        invocation.standard_output_content.unwrap_or_default(),
                        invocation.standard_error_content.unwrap_or_default(),
                        code,
                    ));
                }
            }
        }

        warn!(command_id = %command_id, attempts, "ssm polling exhausted");
        let (stdout, stderr) = last
            .map(|i| {
                (
                    i.standard_output_content.unwrap_or_default(),
                    i.standard_error_content.unwrap_or_default(),
                )
            })
            .unwrap_or_default();
        Ok(ExecutionResult::timed_out(stdout, stderr))
    }

    async fn run_file_script(&self, path: &str, script: &str) -> Result<ExecutionResult> {
        if self.target.is_powershell() {
            return Err(BackendError::file_op(
                path,
                "file helpers need a shell script document",
            ));
        }
        let result = self.run_script(script, None).await?;
        match result.exit_code {
            0 if !result.timed_out => Ok(result),
            MISSING_FILE_EXIT => Err(BackendError::file_op(path, "file does not exist")),
            _ if result.timed_out => Err(BackendError::file_op(path, "ssm command did not finish")),
            _ => Err(BackendError::file_op(path, result.stderr.trim().to_string())),
        }
    }

    async fn write(&self, path: &str, content: &str, mode: WriteMode, backup: bool) -> Result<bool> {
        let script = remote_write_script(path, content, mode, backup, chrono::Local::now());
        self.run_file_script(path, &script).await?;
        info!(instance = %self.target.instance_id, path = %path, mode = ?mode, "remote file written");
        Ok(true)
    }
}

#[async_trait]
impl ExecutionBackend for SsmBackend {
    fn protocol(&self) -> Protocol {
        Protocol::Ssm
    }

    fn supports_streaming(&self) -> bool {
        false
    }

    async fn execute_command(&self, cmd: &str, opts: ExecOptions) -> Result<ExecutionResult> {
        let start = Instant::now();

        // No probe round-trip here, the allow-list is the only check
        let shell = match opts.shell.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(shell) => {
                check_allowed(shell, &self.allowed_shells)?;
                validate_shell_name(shell)?;
                Some(shell)
            }
            None => None,
        };

        let cwd = opts.cwd.as_deref().or(self.working_dir.as_deref());
        let script = self.script_for(cmd, cwd, shell);
        let result = self.run_script(&script, opts.effective_timeout()).await?;

        info!(
            instance = %self.target.instance_id,
            command = %cmd.chars().take(100).collect::<String>(),
            duration_ms = start.elapsed().as_millis() as u64,
            exit_code = result.exit_code,
            timed_out = result.timed_out,
            "ssm command executed"
        );
        Ok(result)
    }

    async fn create_file(&self, path: &str, content: &str, backup: bool) -> Result<bool> {
        self.write(path, content, WriteMode::Create, backup).await
    }

    async fn update_file(&self, path: &str, content: &str, backup: bool) -> Result<bool> {
        self.write(path, content, WriteMode::Update, backup).await
    }

    async fn amend_file(&self, path: &str, content: &str, backup: bool) -> Result<bool> {
        self.write(path, content, WriteMode::Append, backup).await
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        self.run_file_script(path, &format!("rm -f {}", quote(path)))
            .await
            .map(|_| ())
    }

    async fn list_files(
        &self,
        dir: &str,
        limit: usize,
        offset: usize,
        order: ListOrder,
    ) -> Result<FileListing> {
        let result = self
            .run_file_script(dir, &remote_list_script(dir, order))
            .await?;
        let names = result
            .stdout
            .lines()
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        Ok(FileListing::page(names, limit, offset))
    }

    async fn present_working_directory(&self) -> Result<String> {
        let script = if self.target.is_powershell() {
            self.script_for("(Get-Location).Path", self.working_dir.as_deref(), None)
        } else {
            self.script_for("pwd", self.working_dir.as_deref(), None)
        };
        let result = self.run_script(&script, None).await?;
        Ok(result.stdout.trim().to_string())
    }
}
