// Policy module - command safety classification

pub mod error;
pub mod evaluator;
pub mod types;

pub use error::PolicyError;
pub use evaluator::{DEFAULT_CONFIRM_PATTERNS, HARD_DENY_COMMANDS, SafetyEvaluator};
pub use types::{CommandSafety, SafetyDecision};
