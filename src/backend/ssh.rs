// SSH backend driving the system ssh client over a shared control socket

use super::error::{BackendError, Result};
use super::files::{WriteMode, remote_list_script, remote_write_script};
use super::process::{Captured, TimeoutAction, run_captured};
use super::shell::{join, probe_command, quote, resolve_shell, shell_args};
use super::types::{ExecOptions, ExecutionResult, FileListing, ListOrder};
use super::ExecutionBackend;
use crate::config::{AppConfig, Protocol};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// ssh reports its own failures (auth, unreachable host) as 255
const SSH_CONNECTION_EXIT: i32 = 255;

/// Exit code of the update script when the file is missing
const MISSING_FILE_EXIT: i32 = 3;

/// Connection settings for one remote host
#[derive(Debug, Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub identity_file: Option<PathBuf>,
    /// Where ControlMaster sockets live
    pub control_dir: PathBuf,
    pub connect_timeout_secs: u64,
    pub control_persist_secs: u64,
}

impl SshTarget {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: None,
            identity_file: None,
            control_dir: std::env::temp_dir().join("cmdrelay-ssh"),
            connect_timeout_secs: 10,
            control_persist_secs: 600,
        }
    }

    pub fn destination(&self) -> String {
        match &self.username {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    /// Options shared by every invocation, ending with `-- <destination>`
    pub fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ControlMaster=auto".to_string(),
            "-o".to_string(),
            format!(
                "ControlPath={}",
                self.control_dir.join("cmdrelay-%C").display()
            ),
            "-o".to_string(),
            format!("ControlPersist={}", self.control_persist_secs),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
        ];
        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push("--".to_string());
        args.push(self.destination());
        args
    }
}

/// Remote command line: optional `cd`, optional explicit shell
pub fn remote_command(cmd: &str, cwd: Option<&str>, shell: Option<&str>) -> String {
    let body = match shell {
        Some(shell) => {
            let mut words = vec![shell.to_string()];
            words.extend(shell_args(shell, cmd));
            join(&words)
        }
        None => cmd.to_string(),
    };
    match cwd {
        Some(dir) => format!("cd {} && {}", quote(dir), body),
        None => body,
    }
}

pub struct SshBackend {
    target: SshTarget,
    allowed_shells: Vec<String>,
    working_dir: Option<String>,
}

impl SshBackend {
    pub fn new(target: SshTarget, allowed_shells: Vec<String>) -> Self {
        Self {
            target,
            allowed_shells,
            working_dir: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let server = &config.server;
        let mut target = SshTarget::new(server.host.clone());
        target.port = server.port;
        target.username = server.username.clone();
        target.identity_file = server.identity_file.clone();
        if let Some(dir) = &server.control_dir {
            target.control_dir = dir.clone();
        }
        std::fs::create_dir_all(&target.control_dir)?;

        let mut backend = Self::new(target, config.execution.shell.allowed.clone());
        backend.working_dir = server.working_dir.clone();
        Ok(backend)
    }

    fn connection_failure(&self, message: impl Into<String>) -> BackendError {
        BackendError::ConnectionFailure {
            target: self.target.destination(),
            message: message.into(),
        }
    }

    /// Run one remote command line, mapping ssh's own failures
    async fn run_remote(&self, remote: &str, timeout: Option<Duration>) -> Result<Captured> {
        let mut cmd = Command::new("ssh");
        cmd.args(self.target.base_args()).arg(remote);

        let captured = match run_captured(cmd, None, timeout, TimeoutAction::Detach).await {
            Ok(captured) => captured,
            Err(BackendError::Spawn { source, .. }) => {
                return Err(self.connection_failure(format!("ssh client unavailable: {}", source)));
            }
            Err(e) => return Err(e),
        };

        if captured.exit_code == Some(SSH_CONNECTION_EXIT) {
            warn!(target = %self.target.destination(), stderr = %captured.stderr.trim(), "ssh connection failed");
            return Err(self.connection_failure(captured.stderr.trim().to_string()));
        }
        Ok(captured)
    }

    /// Run a file script through `sh -c` so the remote login shell does not matter
    async fn run_script(&self, path: &str, script: &str) -> Result<Captured> {
        let captured = self
            .run_remote(&join(&["sh", "-c", script]), None)
            .await?;
        match captured.exit_code {
            Some(0) => Ok(captured),
            Some(MISSING_FILE_EXIT) => Err(BackendError::file_op(path, "file does not exist")),
            _ => Err(BackendError::file_op(path, captured.stderr.trim().to_string())),
        }
    }

    async fn probe(&self, shell: String) -> Result<bool> {
        let captured = self.run_remote(&probe_command(&shell), None).await?;
        Ok(captured.exit_code == Some(0))
    }

    async fn write(&self, path: &str, content: &str, mode: WriteMode, backup: bool) -> Result<bool> {
        let script = remote_write_script(path, content, mode, backup, chrono::Local::now());
        self.run_script(path, &script).await?;
        info!(target = %self.target.destination(), path = %path, mode = ?mode, "remote file written");
        Ok(true)
    }
}

#[async_trait]
impl ExecutionBackend for SshBackend {
    fn protocol(&self) -> Protocol {
        Protocol::Ssh
    }

    async fn execute_command(&self, cmd: &str, opts: ExecOptions) -> Result<ExecutionResult> {
        let start = Instant::now();

        // Without an explicit shell the remote login shell runs the command
        let shell = match opts.shell.as_deref() {
            Some(requested) => Some(
                resolve_shell(Some(requested), requested, &self.allowed_shells, |s| self.probe(s))
                    .await?,
            ),
            None => None,
        };

        let cwd = opts.cwd.as_deref().or(self.working_dir.as_deref());
        let remote = remote_command(cmd, cwd, shell.as_deref());
        debug!(target = %self.target.destination(), remote = %remote, "executing ssh command");

        let timeout = opts.effective_timeout().map(Duration::from_millis);
        let captured = self.run_remote(&remote, timeout).await?;

        let result = match captured.exit_code {
            Some(code) => ExecutionResult::from_output(captured.stdout, captured.stderr, code),
            None => ExecutionResult::timed_out(captured.stdout, captured.stderr),
        };

        info!(
            target = %self.target.destination(),
            command = %cmd.chars().take(100).collect::<String>(),
            duration_ms = start.elapsed().as_millis() as u64,
            exit_code = result.exit_code,
            timed_out = result.timed_out,
            "ssh command executed"
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
        self.run_script(path, &format!("rm -f {}", quote(path)))
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
        let captured = self.run_script(dir, &remote_list_script(dir, order)).await?;
        let names = captured
            .stdout
            .lines()
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        Ok(FileListing::page(names, limit, offset))
    }

    async fn present_working_directory(&self) -> Result<String> {
        let remote = match &self.working_dir {
            Some(dir) => format!("cd {} && pwd", quote(dir)),
            None => "pwd".to_string(),
        };
        let captured = self.run_remote(&remote, None).await?;
        Ok(captured.stdout.trim().to_string())
    }
}
