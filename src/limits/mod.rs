// Limits module - input/output circuit breakers and the LLM budget counter

pub mod budget;
pub mod enforcer;
pub mod error;
pub mod types;

pub use budget::LlmBudget;
pub use enforcer::{LimitEnforcer, prefix_chars};
pub use error::LimitError;
pub use types::{ClippedOutput, InputCheck, LimitConfig, RejectedInput};

use crate::config::AppConfig;
use crate::config::env::{parse_bool_override, parse_override};
use tracing::debug;

impl LimitConfig {
    /// Resolve from the process environment
    pub fn resolve(config: &AppConfig) -> Self {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Layering: `LIMITS_*` env > active profile session > `limits` section
    pub fn resolve_with<F>(config: &AppConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = &config.limits;
        let mut limits = Self {
            max_input_chars: base.max_input_chars,
            max_output_chars: base.max_output_chars,
            max_session_duration_sec: base.max_session_duration_sec,
            max_session_idle_sec: base.max_session_idle_sec,
            max_llm_cost_usd: base.max_llm_cost_usd,
            allow_truncation: base.allow_truncation,
        };

        if let Some(session) = config.active_profile().and_then(|p| p.session.as_ref()) {
            if let Some(v) = session.max_input_chars {
                limits.max_input_chars = v;
            }
            if let Some(v) = session.max_output_chars {
                limits.max_output_chars = v;
            }
            if let Some(v) = session.max_duration {
                limits.max_session_duration_sec = v;
            }
            if let Some(v) = session.max_idle {
                limits.max_session_idle_sec = v;
            }
        }

        limits.max_input_chars =
            parse_override(&lookup, "LIMITS_MAX_INPUT_CHARS", limits.max_input_chars);
        limits.max_output_chars =
            parse_override(&lookup, "LIMITS_MAX_OUTPUT_CHARS", limits.max_output_chars);
        limits.max_session_duration_sec = parse_override(
            &lookup,
            "LIMITS_MAX_SESSION_DURATION_SEC",
            limits.max_session_duration_sec,
        );
        limits.max_session_idle_sec = parse_override(
            &lookup,
            "LIMITS_MAX_SESSION_IDLE_SEC",
            limits.max_session_idle_sec,
        );
        if lookup("LIMITS_MAX_LLM_COST_USD").is_some() {
            let current = limits.max_llm_cost_usd.unwrap_or(f64::NAN);
            let parsed = parse_override(&lookup, "LIMITS_MAX_LLM_COST_USD", current);
            limits.max_llm_cost_usd = Some(parsed).filter(|v| v.is_finite());
        }
        limits.allow_truncation =
            parse_bool_override(&lookup, "LIMITS_ALLOW_TRUNCATION", limits.allow_truncation);

        debug!(
            max_input_chars = limits.max_input_chars,
            max_output_chars = limits.max_output_chars,
            profile = ?config.active_profile.as_deref(),
            "limits resolved"
        );
        limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Profile, SessionLimits};
    use std::collections::HashMap;

    fn profiled_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.limits.max_input_chars = 1000;
        config.limits.max_output_chars = 2000;
        config.profiles.push(Profile {
            name: "tight".into(),
            session: Some(SessionLimits {
                max_input_chars: Some(10),
                max_idle: Some(30),
                ..Default::default()
            }),
        });
        config
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_profile() {
        let limits = LimitConfig::resolve_with(&profiled_config(), no_env);
        assert_eq!(limits.max_input_chars, 1000);
        assert_eq!(limits.max_output_chars, 2000);
        assert_eq!(limits.max_llm_cost_usd, None);
    }

    #[test]
    fn test_profile_overlays_defaults() {
        let mut config = profiled_config();
        config.active_profile = Some("tight".into());
        let limits = LimitConfig::resolve_with(&config, no_env);
        assert_eq!(limits.max_input_chars, 10);
        assert_eq!(limits.max_session_idle_sec, 30);
        // Fields the profile leaves unset keep the default
        assert_eq!(limits.max_output_chars, 2000);
    }

    #[test]
    fn test_unknown_profile_is_ignored() {
        let mut config = profiled_config();
        config.active_profile = Some("missing".into());
        let limits = LimitConfig::resolve_with(&config, no_env);
        assert_eq!(limits.max_input_chars, 1000);
    }

    #[test]
    fn test_env_wins_over_profile() {
        let mut config = profiled_config();
        config.active_profile = Some("tight".into());
        let env: HashMap<&str, &str> = [
            ("LIMITS_MAX_INPUT_CHARS", "77"),
            ("LIMITS_MAX_LLM_COST_USD", "1.5"),
            ("LIMITS_ALLOW_TRUNCATION", "true"),
        ]
        .into_iter()
        .collect();
        let limits = LimitConfig::resolve_with(&config, |n| env.get(n).map(|v| v.to_string()));
        assert_eq!(limits.max_input_chars, 77);
        assert_eq!(limits.max_llm_cost_usd, Some(1.5));
        assert!(limits.allow_truncation);
    }
}
