// Plan types

use crate::backend::ExecutionResult;
use crate::chat::ErrorAnalysis;
use crate::policy::CommandSafety;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One proposed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCommand {
    pub cmd: String,
    #[serde(default)]
    pub explain: String,
}

impl PlanCommand {
    pub fn new(cmd: impl Into<String>, explain: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            explain: explain.into(),
        }
    }
}

/// Ordered commands proposed for one set of instructions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub model: String,
    pub provider: String,
    pub commands: Vec<PlanCommand>,
}

impl Plan {
    pub fn new(model: impl Into<String>, provider: impl Into<String>, commands: Vec<PlanCommand>) -> Self {
        Self {
            model: model.into(),
            provider: provider.into(),
            commands,
        }
    }

    pub fn command_lines(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.cmd.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Sync,
    Stream,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Report the plan and its safety without executing
    pub dry_run: bool,
    /// Caller accepts needs-confirm commands
    pub confirm: bool,
}

/// Result of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub cmd: String,
    pub explain: String,
    #[serde(flatten)]
    pub result: ExecutionResult,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ai_analysis: Option<ErrorAnalysis>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockReason {
    HardDeny,
    NeedsConfirmation,
}

impl BlockReason {
    /// HTTP status the collaborator answers with
    pub fn status(&self) -> u16 {
        match self {
            BlockReason::HardDeny => 403,
            BlockReason::NeedsConfirmation => 409,
        }
    }
}

/// Terminal state of a plan run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PlanOutcome {
    Done {
        plan: Plan,
        safety: Vec<CommandSafety>,
        results: Vec<StepRecord>,
        terminated: bool,
    },
    Blocked {
        plan: Plan,
        safety: Vec<CommandSafety>,
        reason: BlockReason,
    },
    Aborted {
        plan: Plan,
        safety: Vec<CommandSafety>,
        results: Vec<StepRecord>,
        message: String,
    },
}

impl PlanOutcome {
    pub fn http_status(&self) -> u16 {
        match self {
            PlanOutcome::Done { .. } => 200,
            PlanOutcome::Blocked { reason, .. } => reason.status(),
            PlanOutcome::Aborted { .. } => 502,
        }
    }

    pub fn status_name(&self) -> &'static str {
        match self {
            PlanOutcome::Done { .. } => "done",
            PlanOutcome::Blocked { .. } => "blocked",
            PlanOutcome::Aborted { .. } => "aborted",
        }
    }

    pub fn plan(&self) -> &Plan {
        match self {
            PlanOutcome::Done { plan, .. }
            | PlanOutcome::Blocked { plan, .. }
            | PlanOutcome::Aborted { plan, .. } => plan,
        }
    }

    pub fn results(&self) -> &[StepRecord] {
        match self {
            PlanOutcome::Done { results, .. } | PlanOutcome::Aborted { results, .. } => results,
            PlanOutcome::Blocked { .. } => &[],
        }
    }

    pub fn terminated(&self) -> bool {
        matches!(self, PlanOutcome::Done { terminated: true, .. })
    }
}

/// Which engine turns instructions into a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlanEngine {
    #[default]
    Chat,
    Interpreter,
}

impl FromStr for PlanEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "chat" | "llm" => Ok(PlanEngine::Chat),
            "interpreter" | "llm:interpreter" => Ok(PlanEngine::Interpreter),
            other => Err(format!("unknown engine '{}'", other)),
        }
    }
}

/// Body of an execute-llm request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanRequest {
    pub instructions: String,
    pub dry_run: bool,
    pub stream: bool,
    pub confirm: bool,
    pub model: Option<String>,
    pub engine: Option<String>,
    /// Estimated cost charged against the LLM budget
    pub cost_usd: Option<f64>,
}

impl PlanRequest {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            ..Default::default()
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            dry_run: self.dry_run,
            confirm: self.confirm,
        }
    }

    pub fn mode(&self) -> RunMode {
        if self.stream { RunMode::Stream } else { RunMode::Sync }
    }
}
