// Registry module - enabled interpreters and shells

pub mod error;
pub mod executors;
pub mod types;

pub use error::RegistryError;
pub use executors::ExecutorRegistry;
pub use types::{ExecutorInfo, ExecutorKind, ExecutorRoute, SHELL_EXECUTORS};
