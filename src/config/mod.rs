// Config module - layered configuration (defaults < TOML file < environment)

pub mod env;
pub mod error;
pub mod types;

pub use error::ConfigError;
pub use types::{
    AppConfig, ExecutorEntry, LimitsSection, LlmSection, PagerSection, Profile, Protocol,
    SecuritySection, ServerSection, SessionLimits,
};

use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default config file location: `~/.cmdrelay/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".cmdrelay").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from(".cmdrelay/config.toml"))
}

impl AppConfig {
    /// Load `.env`, the TOML file and environment overrides, then validate.
    ///
    /// The file is `path` if given, else `CMDRELAY_CONFIG`, else the default location.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("CMDRELAY_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(default_config_path);

        let mut config = Self::from_file(&path)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;

        info!(
            path = %path.display(),
            protocol = %config.server.protocol,
            executors = config.executors.len(),
            llm_enabled = config.llm.enabled,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Read a TOML file; a missing file yields the defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Check cross-field requirements the schema cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, entry) in &self.executors {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("executor name must not be empty".into()));
            }
            if entry.cmd.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "executors.{}.cmd must not be empty",
                    name
                )));
            }
        }

        match self.server.protocol {
            Protocol::Ssh if self.server.host.trim().is_empty() => Err(ConfigError::Invalid(
                "server.host is required for the ssh protocol".into(),
            )),
            Protocol::Ssm if self.server.instance_id.is_none() => Err(ConfigError::Invalid(
                "server.instance_id is required for the ssm protocol".into(),
            )),
            _ => Ok(()),
        }
    }

    /// The profile named by `active_profile`, if any
    pub fn active_profile(&self) -> Option<&Profile> {
        let name = self.active_profile.as_deref()?;
        self.profiles.iter().find(|p| p.name == name)
    }
}
