// Local interpreter engine: runs an interpreter binary and mines its output for commands

use super::extract::extract_candidate_commands;
use super::types::{Plan, PlanCommand};
use crate::backend::ExecutionResult;
use crate::backend::process::{TimeoutAction, run_captured};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{info, warn};

pub const INTERPRETER_PROVIDER: &str = "interpreter";

#[derive(Debug, Clone)]
pub struct InterpreterEngine {
    bin: String,
    timeout: Duration,
}

impl InterpreterEngine {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }

    pub fn args(model: &str) -> Vec<String> {
        ["-m", model, "--auto_run", "--stdin", "--plain"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Run the interpreter with `instructions` on stdin; failures become a result with exit 1
    pub async fn run(&self, instructions: &str, model: &str) -> ExecutionResult {
        let start = Instant::now();
        let mut cmd = Command::new(&self.bin);
        cmd.args(Self::args(model));

        let timeout = (!self.timeout.is_zero()).then_some(self.timeout);
        let result = match run_captured(
            cmd,
            Some(instructions.as_bytes().to_vec()),
            timeout,
            TimeoutAction::Kill,
        )
        .await
        {
            Ok(captured) => match captured.exit_code {
                Some(code) => ExecutionResult::from_output(captured.stdout, captured.stderr, code),
                None => ExecutionResult::timed_out(captured.stdout, captured.stderr),
            },
            Err(e) => {
                warn!(bin = %self.bin, error = %e, "interpreter failed to start");
                ExecutionResult {
                    stderr: e.to_string(),
                    exit_code: 1,
                    error: true,
                    ..Default::default()
                }
            }
        };

        info!(
            bin = %self.bin,
            model = %model,
            duration_ms = start.elapsed().as_millis() as u64,
            exit_code = result.exit_code,
            "interpreter finished"
        );
        result
    }

    /// Run and build a plan from the candidate lines of its output
    pub async fn plan(&self, instructions: &str, model: &str) -> (Plan, ExecutionResult) {
        let output = self.run(instructions, model).await;
        let commands = extract_candidate_commands(&output.stdout)
            .into_iter()
            .map(|cmd| PlanCommand::new(cmd, "extracted from interpreter output"))
            .collect();
        (Plan::new(model, INTERPRETER_PROVIDER, commands), output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() {
        assert_eq!(
            InterpreterEngine::args("gpt-4o"),
            vec!["-m", "gpt-4o", "--auto_run", "--stdin", "--plain"]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_folds_into_result() {
        let engine = InterpreterEngine::new("definitely-not-an-interpreter-bin", Duration::from_secs(5));
        let (plan, output) = engine.plan("list files", "m").await;
        assert_eq!(output.exit_code, 1);
        assert!(output.error);
        assert!(plan.commands.is_empty());
        assert_eq!(plan.provider, "interpreter");
    }
}
