// Child process capture with a completion/timeout race

use super::error::{BackendError, Result};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long to wait for pipe readers after the child is gone
const READER_GRACE: Duration = Duration::from_secs(2);

/// What to do with the child when the timer wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutAction {
    /// Kill the child (local hard timeout)
    Kill,
    /// Leave it running and return what was read (remote soft timeout)
    Detach,
}

/// Output collected from one child process
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the timer won
    pub exit_code: Option<i32>,
}

impl Captured {
    pub fn timed_out(&self) -> bool {
        self.exit_code.is_none()
    }
}

type SharedBuf = Arc<Mutex<Vec<u8>>>;

fn spawn_reader<R>(reader: Option<R>, buf: SharedBuf) -> Option<JoinHandle<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = reader?;
    Some(tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => buf
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .extend_from_slice(&chunk[..n]),
                Err(e) => {
                    debug!(error = %e, "pipe read failed");
                    break;
                }
            }
        }
    }))
}

fn snapshot(buf: &SharedBuf) -> String {
    let bytes = buf.lock().unwrap_or_else(|e| e.into_inner());
    String::from_utf8_lossy(&bytes).into_owned()
}

async fn join_readers(readers: Vec<JoinHandle<()>>) {
    for handle in readers {
        if tokio::time::timeout(READER_GRACE, handle).await.is_err() {
            debug!("pipe reader still open after grace period");
        }
    }
}

/// Spawn `cmd`, optionally feed `stdin`, and race completion against `timeout`.
pub async fn run_captured(
    mut cmd: Command,
    stdin: Option<Vec<u8>>,
    timeout: Option<Duration>,
    on_timeout: TimeoutAction,
) -> Result<Captured> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .kill_on_drop(on_timeout == TimeoutAction::Kill);

    let mut child = cmd.spawn().map_err(|source| BackendError::Spawn {
        program: program.clone(),
        source,
    })?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        tokio::spawn(async move {
            if let Err(e) = pipe.write_all(&input).await {
                debug!(error = %e, "stdin write failed");
            }
            // Dropping the pipe closes stdin
        });
    }

    let stdout_buf: SharedBuf = Arc::default();
    let stderr_buf: SharedBuf = Arc::default();
    let readers: Vec<JoinHandle<()>> = [
        spawn_reader(child.stdout.take(), stdout_buf.clone()),
        spawn_reader(child.stderr.take(), stderr_buf.clone()),
    ]
    .into_iter()
    .flatten()
    .collect();

    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => Some(status?),
            Err(_) => None,
        },
        None => Some(child.wait().await?),
    };

    match status {
        Some(status) => {
            join_readers(readers).await;
            Ok(Captured {
                stdout: snapshot(&stdout_buf),
                stderr: snapshot(&stderr_buf),
                exit_code: Some(status.code().unwrap_or(-1)),
            })
        }
        None => {
            warn!(
                program = %program,
                timeout_ms = timeout.map(|d| d.as_millis() as u64).unwrap_or(0),
                action = ?on_timeout,
                "process timed out"
            );
            if on_timeout == TimeoutAction::Kill {
                if let Err(e) = child.start_kill() {
                    debug!(error = %e, "kill after timeout failed");
                }
                let _ = tokio::time::timeout(READER_GRACE, child.wait()).await;
                join_readers(readers).await;
            }
            Ok(Captured {
                stdout: snapshot(&stdout_buf),
                stderr: snapshot(&stderr_buf),
                exit_code: None,
            })
        }
    }
}
