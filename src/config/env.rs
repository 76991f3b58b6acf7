// Environment overrides

use super::AppConfig;
use tracing::warn;

/// Parse an override from `lookup`, logging a warning if the value is present but invalid.
pub fn parse_override<T, F>(lookup: &F, name: &str, current: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(v) => match v.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(var = name, value = %v, "Invalid env var value, using current");
                current
            }
        },
        None => current,
    }
}

/// Boolean override accepting `true/false/1/0/yes/no`
pub fn parse_bool_override<F>(lookup: &F, name: &str, current: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(var = name, value = %v, "Invalid boolean env var, using current");
                current
            }
        },
        None => current,
    }
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl AppConfig {
    /// Apply environment overrides on top of the file values.
    ///
    /// `LIMITS_*` variables are not applied here: limit resolution layers them
    /// above the active profile, see `LimitConfig::resolve_with`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("SHELL_ALLOWED") {
            self.execution.shell.allowed = split_list(&raw);
        }
        self.execution.shell.enabled =
            parse_bool_override(&lookup, "SHELL_ENABLED", self.execution.shell.enabled);
        if let Some(shell) = lookup("DEFAULT_SHELL").filter(|s| !s.trim().is_empty()) {
            self.execution.shell.default = Some(shell.trim().to_string());
        }

        if let Some(raw) = lookup("DENY_COMMAND_REGEX") {
            self.security.deny_command_regex = raw;
        }
        if let Some(raw) = lookup("CONFIRM_COMMAND_REGEX") {
            self.security.confirm_command_regex = raw;
        }

        if let Some(name) = lookup("ACTIVE_PROFILE").filter(|s| !s.trim().is_empty()) {
            self.active_profile = Some(name.trim().to_string());
        }

        self.sse.heartbeat_ms = parse_override(&lookup, "SSE_HEARTBEAT_MS", self.sse.heartbeat_ms);

        self.llm.enabled = parse_bool_override(&lookup, "LLM_ENABLED", self.llm.enabled);
        self.llm.auto_analyze_errors = parse_bool_override(
            &lookup,
            "AUTO_ANALYZE_ERRORS",
            self.llm.auto_analyze_errors,
        );
        if let Some(endpoint) = lookup("LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Some(key) = lookup("LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_apply_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env(lookup_from(&[
            ("SHELL_ALLOWED", "bash, sh,,zsh"),
            ("CONFIRM_COMMAND_REGEX", "git push"),
            ("SSE_HEARTBEAT_MS", "250"),
            ("LLM_ENABLED", "yes"),
            ("ACTIVE_PROFILE", "ci"),
        ]));

        assert_eq!(config.execution.shell.allowed, vec!["bash", "sh", "zsh"]);
        assert_eq!(config.security.confirm_command_regex, "git push");
        assert_eq!(config.sse.heartbeat_ms, 250);
        assert!(config.llm.enabled);
        assert_eq!(config.active_profile.as_deref(), Some("ci"));
    }

    #[test]
    fn test_invalid_override_keeps_current() {
        let mut config = AppConfig::default();
        config.apply_env(lookup_from(&[
            ("SSE_HEARTBEAT_MS", "soon"),
            ("AUTO_ANALYZE_ERRORS", "maybe"),
        ]));

        assert_eq!(config.sse.heartbeat_ms, 15_000);
        assert!(config.llm.auto_analyze_errors);
    }
}
