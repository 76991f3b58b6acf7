// Local process backend

use super::error::{BackendError, Result};
use super::files::backup_path;
use super::process::{TimeoutAction, run_captured};
use super::shell::{platform_default_shell, probe_command, resolve_shell, shell_args};
use super::types::{ExecOptions, ExecutionResult, FileListing, ListOrder};
use super::ExecutionBackend;
use crate::config::{AppConfig, Protocol};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs commands as child processes of this daemon
pub struct LocalBackend {
    default_shell: String,
    allowed_shells: Vec<String>,
    working_dir: Option<String>,
    /// Shells already probed successfully
    available: Mutex<HashSet<String>>,
}

impl LocalBackend {
    pub fn new(default_shell: impl Into<String>, allowed_shells: Vec<String>) -> Self {
        Self {
            default_shell: default_shell.into(),
            allowed_shells,
            working_dir: None,
            available: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let shell = config
            .execution
            .shell
            .default
            .clone()
            .unwrap_or_else(|| platform_default_shell().to_string());
        let mut backend = Self::new(shell, config.execution.shell.allowed.clone());
        backend.working_dir = config.server.working_dir.clone();
        backend
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    async fn probe(&self, shell: String) -> Result<bool> {
        if self
            .available
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&shell)
        {
            return Ok(true);
        }

        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("where");
            cmd.arg(&shell);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(probe_command(&shell));
            cmd
        };
        let found = match cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(e) => {
                debug!(shell = %shell, error = %e, "shell probe could not run");
                false
            }
        };

        if found {
            self.available
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(shell);
        }
        Ok(found)
    }

    async fn backup_if_requested(&self, path: &str, backup: bool) -> Result<()> {
        if backup && tokio::fs::try_exists(path).await.unwrap_or(false) {
            let target = backup_path(path, chrono::Local::now());
            tokio::fs::copy(path, &target)
                .await
                .map_err(|e| BackendError::file_op(path, format!("backup failed: {}", e)))?;
            debug!(path = %path, backup = %target, "backup written");
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionBackend for LocalBackend {
    fn protocol(&self) -> Protocol {
        Protocol::Local
    }

    fn temp_dir(&self) -> String {
        std::env::temp_dir().to_string_lossy().into_owned()
    }

    async fn execute_command(&self, cmd: &str, opts: ExecOptions) -> Result<ExecutionResult> {
        let start = Instant::now();
        let shell = resolve_shell(
            opts.shell.as_deref(),
            &self.default_shell,
            &self.allowed_shells,
            |s| self.probe(s),
        )
        .await?;

        let mut command = Command::new(&shell);
        command.args(shell_args(&shell, cmd));
        if let Some(dir) = opts.cwd.as_ref().or(self.working_dir.as_ref()) {
            command.current_dir(dir);
        }

        debug!(command = %cmd, shell = %shell, cwd = ?opts.cwd, "executing local command");

        let timeout = opts.effective_timeout().map(Duration::from_millis);
        let captured = run_captured(command, None, timeout, TimeoutAction::Kill).await?;

        let result = match captured.exit_code {
            Some(code) => ExecutionResult::from_output(captured.stdout, captured.stderr, code),
            None => ExecutionResult::timed_out(captured.stdout, captured.stderr),
        };

        info!(
            command = %cmd.chars().take(100).collect::<String>(),
            shell = %shell,
            duration_ms = start.elapsed().as_millis() as u64,
            exit_code = result.exit_code,
            timed_out = result.timed_out,
            output_bytes = result.stdout.len() + result.stderr.len(),
            "local command executed"
        );
        Ok(result)
    }

    async fn create_file(&self, path: &str, content: &str, backup: bool) -> Result<bool> {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::file_op(path, e.to_string()))?;
        }
        self.backup_if_requested(path, backup).await?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| BackendError::file_op(path, e.to_string()))?;
        info!(path = %path, bytes = content.len(), "file created");
        Ok(true)
    }

    async fn update_file(&self, path: &str, content: &str, backup: bool) -> Result<bool> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(BackendError::file_op(path, "file does not exist"));
        }
        self.backup_if_requested(path, backup).await?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| BackendError::file_op(path, e.to_string()))?;
        info!(path = %path, bytes = content.len(), "file updated");
        Ok(true)
    }

    async fn amend_file(&self, path: &str, content: &str, backup: bool) -> Result<bool> {
        self.backup_if_requested(path, backup).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| BackendError::file_op(path, e.to_string()))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| BackendError::file_op(path, e.to_string()))?;
        file.flush().await?;
        info!(path = %path, bytes = content.len(), "file amended");
        Ok(true)
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::file_op(path, e.to_string())),
        }
    }

    async fn list_files(
        &self,
        dir: &str,
        limit: usize,
        offset: usize,
        order: ListOrder,
    ) -> Result<FileListing> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| BackendError::file_op(dir, e.to_string()))?;

        let mut found: Vec<(String, SystemTime, u64)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            found.push((
                entry.file_name().to_string_lossy().into_owned(),
                meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                meta.len(),
            ));
        }

        // Same orderings as `ls -1A`, `ls -1At`, `ls -1AS`
        match order {
            ListOrder::Name => found.sort_by(|a, b| a.0.cmp(&b.0)),
            ListOrder::Mtime => found.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0))),
            ListOrder::Size => found.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0))),
        }

        let names = found.into_iter().map(|(name, _, _)| name).collect();
        Ok(FileListing::page(names, limit, offset))
    }

    async fn present_working_directory(&self) -> Result<String> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?.to_string_lossy().into_owned()),
        }
    }
}
