// Backend module - uniform command execution over local, ssh and ssm targets

pub mod error;
pub mod files;
pub mod local;
pub mod process;
pub mod shell;
pub mod ssh;
pub mod ssm;
pub mod types;

pub use error::{BackendError, Result};
pub use local::LocalBackend;
pub use ssh::{SshBackend, SshTarget};
pub use ssm::{SsmBackend, SsmTarget};
pub use types::{ExecOptions, ExecutionResult, FileListing, ListOrder};

use crate::config::{AppConfig, Protocol};
use async_trait::async_trait;
use std::sync::Arc;

/// Execution target contract shared by every backend
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn protocol(&self) -> Protocol;

    /// Whether results can be produced live for a streaming caller
    fn supports_streaming(&self) -> bool {
        true
    }

    /// Directory for scratch files on the target
    fn temp_dir(&self) -> String {
        "/tmp".to_string()
    }

    /// Run `cmd` through the requested (or default) shell.
    ///
    /// Non-zero exits and soft timeouts are results, not errors.
    async fn execute_command(&self, cmd: &str, opts: ExecOptions) -> Result<ExecutionResult>;

    async fn create_file(&self, path: &str, content: &str, backup: bool) -> Result<bool>;

    async fn update_file(&self, path: &str, content: &str, backup: bool) -> Result<bool>;

    async fn amend_file(&self, path: &str, content: &str, backup: bool) -> Result<bool>;

    /// Missing files are not an error
    async fn remove_file(&self, path: &str) -> Result<()>;

    async fn list_files(
        &self,
        dir: &str,
        limit: usize,
        offset: usize,
        order: ListOrder,
    ) -> Result<FileListing>;

    async fn present_working_directory(&self) -> Result<String>;
}

/// Build the backend selected by `server.protocol`
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn ExecutionBackend>> {
    let backend: Arc<dyn ExecutionBackend> = match config.server.protocol {
        Protocol::Local => Arc::new(LocalBackend::from_config(config)),
        Protocol::Ssh => Arc::new(SshBackend::from_config(config)?),
        Protocol::Ssm => Arc::new(SsmBackend::from_config(config)?),
    };
    Ok(backend)
}
