// Safety evaluator: hard-deny list, then deny patterns, then confirm patterns

use super::error::PolicyError;
use super::types::{CommandSafety, SafetyDecision};
use crate::config::SecuritySection;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

/// Destructive commands, matched as case-insensitive substrings.
/// Entries are lowercase since they are compared against the lowered command.
pub const HARD_DENY_COMMANDS: &[&str] = &[
    "rm -rf /",
    "rm -fr /",
    "rm -rf ~",
    "sudo rm -rf",
    "mkfs",
    "dd if=",
    "format",
    "fdisk",
    "shutdown",
    "reboot",
    "halt",
    "poweroff",
    "init 0",
    "init 6",
    "chmod 777 /",
    "chmod -r 777 /",
    "chown -r root:root /",
    "chown -r root /",
    ":(){ :|:& };:",
    "> /dev/sda",
];

/// Deny patterns used when none are configured: a trailing `:/` targets a root path
pub const DEFAULT_DENY_PATTERNS: &[&str] = &[":/$"];

/// Confirm patterns used when none are configured
pub const DEFAULT_CONFIRM_PATTERNS: &[&str] = &[
    "rm -rf",
    "mkfs",
    "dd if=",
    "shutdown",
    "reboot",
    "userdel",
    "iptables -F",
    "systemctl stop",
];

#[derive(Debug, Clone)]
struct Pattern {
    source: String,
    regex: Regex,
}

/// Compile a comma-separated list of case-insensitive patterns
fn compile_list<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Pattern>, PolicyError> {
    patterns
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map(|regex| Pattern {
                    source: p.to_string(),
                    regex,
                })
                .map_err(|source| PolicyError::InvalidPattern {
                    pattern: p.to_string(),
                    source,
                })
        })
        .collect()
}

fn split_patterns(raw: &str) -> Vec<&str> {
    raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect()
}

fn default_deny() -> Vec<Pattern> {
    compile_list(DEFAULT_DENY_PATTERNS).unwrap_or_default()
}

fn default_confirm() -> Vec<Pattern> {
    let escaped: Vec<String> = DEFAULT_CONFIRM_PATTERNS
        .iter()
        .map(|p| regex::escape(p))
        .collect();
    compile_list(&escaped).unwrap_or_default()
}

/// Pure, synchronous command classifier; patterns compile once at construction
#[derive(Debug, Clone)]
pub struct SafetyEvaluator {
    deny: Vec<Pattern>,
    confirm: Vec<Pattern>,
}

impl Default for SafetyEvaluator {
    fn default() -> Self {
        Self {
            deny: default_deny(),
            confirm: default_confirm(),
        }
    }
}

impl SafetyEvaluator {
    /// Strict constructor: any bad pattern is an error
    pub fn try_new(deny: &str, confirm: &str) -> Result<Self, PolicyError> {
        let deny_list = split_patterns(deny);
        let deny = if deny_list.is_empty() {
            default_deny()
        } else {
            compile_list(&deny_list)?
        };
        let confirm_list = split_patterns(confirm);
        let confirm = if confirm_list.is_empty() {
            default_confirm()
        } else {
            compile_list(&confirm_list)?
        };
        Ok(Self { deny, confirm })
    }

    /// Lenient constructor: a list that fails to compile falls back to its default
    pub fn new(deny: &str, confirm: &str) -> Self {
        let deny_list = split_patterns(deny);
        let deny = if deny_list.is_empty() {
            default_deny()
        } else {
            compile_list(&deny_list).unwrap_or_else(|e| {
                warn!(error = %e, "invalid deny pattern list, using defaults");
                default_deny()
            })
        };

        let confirm_list = split_patterns(confirm);
        let confirm = if confirm_list.is_empty() {
            default_confirm()
        } else {
            compile_list(&confirm_list).unwrap_or_else(|e| {
                warn!(error = %e, "invalid confirm pattern list, using defaults");
                default_confirm()
            })
        };

        debug!(
            deny_patterns = deny.len(),
            confirm_patterns = confirm.len(),
            "safety evaluator built"
        );
        Self { deny, confirm }
    }

    pub fn from_config(security: &SecuritySection) -> Self {
        Self::new(&security.deny_command_regex, &security.confirm_command_regex)
    }

    /// Classify one command; the first matching stage wins
    pub fn evaluate(&self, command: &str) -> SafetyDecision {
        let lowered = command.to_lowercase();
        if let Some(hit) = HARD_DENY_COMMANDS.iter().find(|d| lowered.contains(*d)) {
            return SafetyDecision::deny(*hit);
        }

        if let Some(hit) = self.deny.iter().find(|p| p.regex.is_match(command)) {
            return SafetyDecision::deny(hit.source.clone());
        }

        if let Some(hit) = self.confirm.iter().find(|p| p.regex.is_match(command)) {
            return SafetyDecision::confirm(hit.source.clone());
        }

        SafetyDecision::allow()
    }

    pub fn evaluate_plan<S: AsRef<str>>(&self, commands: &[S]) -> Vec<CommandSafety> {
        commands
            .iter()
            .map(|c| CommandSafety {
                cmd: c.as_ref().to_string(),
                decision: self.evaluate(c.as_ref()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_deny_case_insensitive() {
        let evaluator = SafetyEvaluator::default();
        for cmd in ["sudo RM -RF /", "MKFS.ext4 /dev/sdb1", "dd IF=/dev/zero of=/dev/sda", "Shutdown -h now"] {
            let decision = evaluator.evaluate(cmd);
            assert!(decision.hard_deny, "expected deny for {}", cmd);
            assert!(!decision.needs_confirm);
        }
    }

    #[test]
    fn test_destructive_commands_are_hard_denied() {
        let evaluator = SafetyEvaluator::default();
        for cmd in [
            "rm -rf /",
            "sudo rm -rf ./data",
            "mkfs /dev/sdb",
            "dd if=/dev/zero of=/dev/sda",
            "format c:",
            "fdisk /dev/sda",
            "shutdown now",
            "reboot",
            "halt",
            "init 0",
            "init 6",
            "chmod 777 /",
            "chown -R root:root /",
        ] {
            let decision = evaluator.evaluate(cmd);
            assert!(decision.hard_deny, "expected deny for {}", cmd);
            assert!(!decision.needs_confirm, "{} should not ask for confirmation", cmd);
        }
    }

    #[test]
    fn test_default_deny_pattern() {
        let evaluator = SafetyEvaluator::default();
        let decision = evaluator.evaluate("cp -r build host:/");
        assert!(decision.hard_deny);
        assert_eq!(decision.matched_pattern.as_deref(), Some(":/$"));
        assert!(evaluator.evaluate("scp notes.txt host:/tmp").is_allowed());

        let configured = SafetyEvaluator::new("^nc ", "");
        assert!(configured.evaluate("cp -r build host:/").is_allowed());
    }

    #[test]
    fn test_hard_deny_wins_over_confirm() {
        let evaluator = SafetyEvaluator::new("", "mkfs");
        let decision = evaluator.evaluate("mkfs /dev/sdb");
        assert!(decision.hard_deny);
        assert!(!decision.needs_confirm);
        assert_eq!(decision.matched_pattern.as_deref(), Some("mkfs"));
    }

    #[test]
    fn test_configured_deny_list() {
        let evaluator = SafetyEvaluator::new("curl .*\\| *sh, ^nc ", "");
        let decision = evaluator.evaluate("CURL http://x | sh");
        assert!(decision.hard_deny);
        assert_eq!(decision.matched_pattern.as_deref(), Some("curl .*\\| *sh"));
        assert!(evaluator.evaluate("nc -l 8080").hard_deny);
        assert!(evaluator.evaluate("ls -la").is_allowed());
    }

    #[test]
    fn test_default_confirm_list() {
        let evaluator = SafetyEvaluator::default();
        let decision = evaluator.evaluate("systemctl stop nginx");
        assert!(decision.needs_confirm);
        assert!(!decision.hard_deny);
        assert!(evaluator.evaluate("userdel bob").needs_confirm);
        assert!(evaluator.evaluate("echo hello").is_allowed());
    }

    #[test]
    fn test_configured_confirm_replaces_default() {
        let evaluator = SafetyEvaluator::new("", "git push");
        assert!(evaluator.evaluate("git push origin main").needs_confirm);
        assert!(evaluator.evaluate("userdel bob").is_allowed());
    }

    #[test]
    fn test_invalid_list_falls_back() {
        let evaluator = SafetyEvaluator::new("([", "(unclosed");
        assert!(evaluator.evaluate("userdel bob").needs_confirm);
        assert!(evaluator.evaluate("ls").is_allowed());
        assert!(SafetyEvaluator::try_new("([", "").is_err());
    }

    #[test]
    fn test_evaluate_plan_preserves_order() {
        let evaluator = SafetyEvaluator::default();
        let safety = evaluator.evaluate_plan(&["ls", "rm -rf /", "systemctl stop nginx"]);
        assert_eq!(safety.len(), 3);
        assert_eq!(safety[0].cmd, "ls");
        assert!(safety[0].decision.is_allowed());
        assert!(safety[1].decision.hard_deny);
        assert!(safety[2].decision.needs_confirm);
    }
}
