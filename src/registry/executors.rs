// Executor registry: live, shared view of `executors.*`

use super::error::RegistryError;
use super::types::{ExecutorInfo, ExecutorKind, ExecutorRoute};
use crate::config::{AppConfig, ExecutorEntry};
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// Shared executor table; writes are visible to the next lookup
pub struct ExecutorRegistry {
    executors: RwLock<BTreeMap<String, ExecutorInfo>>,
}

fn validate(info: &ExecutorInfo) -> Result<(), RegistryError> {
    if info.name.trim().is_empty() {
        return Err(RegistryError::Invalid("name must not be empty".into()));
    }
    if info.cmd.trim().is_empty() {
        return Err(RegistryError::Invalid(format!(
            "{}: cmd must not be empty",
            info.name
        )));
    }
    Ok(())
}

impl ExecutorRegistry {
    pub fn new(entries: &BTreeMap<String, ExecutorEntry>) -> Self {
        let executors: BTreeMap<String, ExecutorInfo> = entries
            .iter()
            .map(|(name, entry)| (name.clone(), ExecutorInfo::from_entry(name, entry)))
            .collect();

        info!(
            executor_count = executors.len(),
            enabled = executors.values().filter(|e| e.enabled).count(),
            "executor registry loaded"
        );
        Self {
            executors: RwLock::new(executors),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.executors)
    }

    /// All executors, sorted by name
    pub fn list_executors(&self) -> Vec<ExecutorInfo> {
        let executors = self.executors.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<ExecutorInfo> = executors.values().cloned().collect();
        list.sort_by_key(|e| e.name.to_lowercase());
        list
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<ExecutorInfo> {
        let executors = self.executors.read().unwrap_or_else(|e| e.into_inner());
        executors
            .values()
            .find(|e| e.name.eq_ignore_ascii_case(name.trim()))
            .cloned()
    }

    /// Apply `change` to a copy, validate, then write it back.
    /// `None` for unknown names or invalid results; the stored entry is untouched then.
    fn modify<F>(&self, name: &str, change: F) -> Option<ExecutorInfo>
    where
        F: FnOnce(&mut ExecutorInfo),
    {
        let mut executors = self.executors.write().unwrap_or_else(|e| e.into_inner());
        let key = executors
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name.trim()))
            .cloned()?;

        let mut updated = executors.get(&key)?.clone();
        change(&mut updated);
        if let Err(e) = validate(&updated) {
            warn!(executor = %key, error = %e, "executor update rejected");
            return None;
        }

        executors.insert(key, updated.clone());
        Some(updated)
    }

    pub fn set_executor_enabled(&self, name: &str, enabled: bool) -> Option<ExecutorInfo> {
        let result = self.modify(name, |e| e.enabled = enabled);
        if let Some(info) = &result {
            info!(executor = %info.name, enabled, "executor toggled");
        }
        result
    }

    /// Change the command and/or arguments; at least one must be given
    pub fn update_executor(
        &self,
        name: &str,
        cmd: Option<String>,
        args: Option<Vec<String>>,
    ) -> Option<ExecutorInfo> {
        if cmd.is_none() && args.is_none() {
            return None;
        }
        let result = self.modify(name, |e| {
            if let Some(cmd) = cmd {
                e.cmd = cmd;
            }
            if let Some(args) = args {
                e.args = args;
            }
        });
        if let Some(info) = &result {
            info!(executor = %info.name, cmd = %info.cmd, args = ?info.args, "executor updated");
        }
        result
    }

    /// Resolve a dynamic executor name to a call shape
    pub fn route(&self, name: &str) -> Result<ExecutorRoute, RegistryError> {
        let info = self
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        if !info.enabled {
            return Err(RegistryError::Disabled(info.name));
        }

        debug!(executor = %info.name, kind = ?info.kind, "executor routed");
        Ok(match info.kind {
            ExecutorKind::Shell => ExecutorRoute::Shell {
                shell: info.cmd,
                name: info.name,
                timeout_ms: info.timeout_ms,
            },
            ExecutorKind::Code => ExecutorRoute::Code {
                language: info.name.clone(),
                name: info.name,
                interpreter: info.cmd,
                args: info.args,
                timeout_ms: info.timeout_ms,
            },
        })
    }

    /// Names and commands of enabled shell executors
    pub fn enabled_shells(&self) -> Vec<ExecutorInfo> {
        self.list_executors()
            .into_iter()
            .filter(|e| e.kind == ExecutorKind::Shell && e.enabled)
            .collect()
    }

    /// Current table in config form, for persisting
    pub fn snapshot(&self) -> BTreeMap<String, ExecutorEntry> {
        let executors = self.executors.read().unwrap_or_else(|e| e.into_inner());
        executors
            .iter()
            .map(|(name, info)| (name.clone(), info.to_entry()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ExecutorRegistry {
        ExecutorRegistry::from_config(&AppConfig::default())
    }

    #[test]
    fn test_list_sorted_and_classified() {
        let list = registry().list_executors();
        let names: Vec<&str> = list.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["bash", "powershell", "python", "typescript", "zsh"]);
        assert_eq!(list[0].kind, ExecutorKind::Shell);
        assert_eq!(list[2].kind, ExecutorKind::Code);
    }

    #[test]
    fn test_toggle_visible_immediately() {
        let registry = registry();
        assert!(!registry.get("zsh").unwrap().enabled);
        let updated = registry.set_executor_enabled("ZSH", true).unwrap();
        assert!(updated.enabled);
        assert!(registry.get("zsh").unwrap().enabled);
        assert!(registry.set_executor_enabled("fortran", true).is_none());
    }

    #[test]
    fn test_update_rejects_invalid() {
        let registry = registry();
        assert!(registry.update_executor("python", Some("  ".into()), None).is_none());
        assert_eq!(registry.get("python").unwrap().cmd, "python3");
        assert!(registry.update_executor("python", None, None).is_none());

        let updated = registry
            .update_executor("python", Some("python3.12".into()), Some(vec!["-u".into()]))
            .unwrap();
        assert_eq!(updated.cmd, "python3.12");
        assert_eq!(updated.args, vec!["-u"]);
        assert_eq!(registry.snapshot()["python"].cmd, "python3.12");
    }

    #[test]
    fn test_route() {
        let registry = registry();
        assert_eq!(
            registry.route("cobol"),
            Err(RegistryError::NotFound("cobol".into()))
        );
        assert_eq!(
            registry.route("typescript"),
            Err(RegistryError::Disabled("typescript".into()))
        );
        match registry.route("python").unwrap() {
            ExecutorRoute::Code {
                language,
                interpreter,
                ..
            } => {
                assert_eq!(language, "python");
                assert_eq!(interpreter, "python3");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            registry.route("bash").unwrap(),
            ExecutorRoute::Shell { .. }
        ));
    }

    #[test]
    fn test_enabled_shells() {
        let registry = registry();
        let shells: Vec<String> = registry.enabled_shells().into_iter().map(|e| e.name).collect();
        assert_eq!(shells, vec!["bash"]);
    }
}
