// Policy types

use serde::{Deserialize, Serialize};

/// Classification of one command string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyDecision {
    pub hard_deny: bool,
    pub needs_confirm: bool,
    pub matched_pattern: Option<String>,
}

impl SafetyDecision {
    pub fn allow() -> Self {
        Self::default()
    }

    pub fn deny(pattern: impl Into<String>) -> Self {
        Self {
            hard_deny: true,
            needs_confirm: false,
            matched_pattern: Some(pattern.into()),
        }
    }

    pub fn confirm(pattern: impl Into<String>) -> Self {
        Self {
            hard_deny: false,
            needs_confirm: true,
            matched_pattern: Some(pattern.into()),
        }
    }

    pub fn is_allowed(&self) -> bool {
        !self.hard_deny && !self.needs_confirm
    }
}

/// A plan command paired with its decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSafety {
    pub cmd: String,
    #[serde(flatten)]
    pub decision: SafetyDecision,
}
