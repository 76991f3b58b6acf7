// Plan executor: policy gate, then a strictly sequential fail-fast step loop

use super::error::PlanError;
use super::events::{Emitter, PlanStream, SseFrame};
use super::types::{BlockReason, Plan, PlanOutcome, RunMode, RunOptions, StepRecord};
use crate::backend::{ExecOptions, ExecutionBackend, ExecutionResult};
use crate::chat::{AnalysisContext, NoAnalysis, StepAnalyzer};
use crate::limits::LimitEnforcer;
use crate::policy::SafetyEvaluator;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(15_000);

/// Outcome of `run`: an aggregate or a live stream
pub enum PlanRun {
    Completed(PlanOutcome),
    Streaming(PlanStream),
}

#[derive(Clone)]
pub struct PlanExecutor {
    backend: Arc<dyn ExecutionBackend>,
    evaluator: Arc<SafetyEvaluator>,
    limits: LimitEnforcer,
    analyzer: Arc<dyn StepAnalyzer>,
    heartbeat: Duration,
    step_timeout_ms: Option<u64>,
}

impl PlanExecutor {
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        evaluator: Arc<SafetyEvaluator>,
        limits: LimitEnforcer,
    ) -> Self {
        Self {
            backend,
            evaluator,
            limits,
            analyzer: Arc::new(NoAnalysis),
            heartbeat: DEFAULT_HEARTBEAT,
            step_timeout_ms: None,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn StepAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_step_timeout(mut self, timeout_ms: u64) -> Self {
        self.step_timeout_ms = Some(timeout_ms);
        self
    }

    pub async fn run(&self, plan: Plan, mode: RunMode, opts: RunOptions) -> Result<PlanRun, PlanError> {
        match mode {
            RunMode::Sync => Ok(PlanRun::Completed(self.run_sync(plan, opts).await)),
            RunMode::Stream => Ok(PlanRun::Streaming(self.run_stream(plan, opts)?)),
        }
    }

    pub async fn run_sync(&self, plan: Plan, opts: RunOptions) -> PlanOutcome {
        let mut emitter = Emitter::sync();
        self.drive(plan, opts, &mut emitter).await
    }

    pub fn run_stream(&self, plan: Plan, opts: RunOptions) -> Result<PlanStream, PlanError> {
        self.run_stream_with(async move { Ok(plan) }, opts)
    }

    /// Stream a plan that is still being produced.
    ///
    /// The stream opens before `plan` resolves so heartbeats cover plan
    /// generation; a failed `plan` sends `error` then `done`.
    pub fn run_stream_with<F>(&self, plan: F, opts: RunOptions) -> Result<PlanStream, PlanError>
    where
        F: Future<Output = Result<Plan, PlanError>> + Send + 'static,
    {
        if !self.backend.supports_streaming() {
            return Err(PlanError::StreamingUnsupported(self.backend.protocol()));
        }

        let (mut emitter, stream) = Emitter::stream(self.heartbeat);
        let this = self.clone();
        tokio::spawn(async move {
            match plan.await {
                Ok(plan) => {
                    let outcome = this.drive(plan, opts, &mut emitter).await;
                    emitter.finish(SseFrame::done(&outcome)).await;
                }
                Err(e) => {
                    warn!(error = %e, "plan generation failed");
                    emitter.emit(SseFrame::error(&e.to_string())).await;
                    emitter.finish(SseFrame::done_failed()).await;
                }
            }
        });
        Ok(stream)
    }

    async fn drive(&self, plan: Plan, opts: RunOptions, emitter: &mut Emitter) -> PlanOutcome {
        let safety = self.evaluator.evaluate_plan(&plan.command_lines());

        if opts.dry_run || plan.commands.is_empty() {
            debug!(dry_run = opts.dry_run, commands = plan.commands.len(), "plan not executed");
            emitter.emit(SseFrame::plan(&plan, &safety)).await;
            return PlanOutcome::Done {
                plan,
                safety,
                results: Vec::new(),
                terminated: false,
            };
        }

        emitter.emit(SseFrame::plan(&plan, &safety)).await;

        let reason = if safety.iter().any(|s| s.decision.hard_deny) {
            Some(BlockReason::HardDeny)
        } else if !opts.confirm && safety.iter().any(|s| s.decision.needs_confirm) {
            Some(BlockReason::NeedsConfirmation)
        } else {
            None
        };
        if let Some(reason) = reason {
            warn!(reason = ?reason, commands = plan.commands.len(), "plan blocked by policy");
            emitter.emit(SseFrame::policy(reason, &safety)).await;
            return PlanOutcome::Blocked {
                plan,
                safety,
                reason,
            };
        }

        let max_output = self.limits.limits().max_output_chars;
        let steps = plan.commands.clone();
        let mut results: Vec<StepRecord> = Vec::with_capacity(steps.len());
        let mut output_chars = 0usize;
        let mut terminated = false;

        for (index, step) in steps.iter().enumerate() {
            if !emitter.is_connected() {
                info!(index, "client disconnected, no further steps dispatched");
                break;
            }
            emitter
                .emit(SseFrame::step_start(index, &step.cmd, &step.explain))
                .await;

            let mut exec = ExecOptions::new();
            exec.timeout_ms = self.step_timeout_ms;
            let raw = match self.backend.execute_command(&step.cmd, exec).await {
                Ok(result) => result,
                Err(e) if e.is_connection_failure() => {
                    error!(index, command = %step.cmd, error = %e, "plan aborted");
                    emitter.emit(SseFrame::error(&e.to_string())).await;
                    return PlanOutcome::Aborted {
                        plan,
                        safety,
                        results,
                        message: e.to_string(),
                    };
                }
                Err(e) => {
                    warn!(index, command = %step.cmd, error = %e, "step failed in backend");
                    ExecutionResult::failure(e.to_string())
                }
            };

            let clipped = self.limits.clip_output(&raw.stdout, &raw.stderr);
            let mut result = ExecutionResult {
                stdout: clipped.stdout,
                stderr: clipped.stderr,
                truncated: raw.truncated || clipped.truncated,
                ..raw
            };

            output_chars += result.stdout.chars().count() + result.stderr.chars().count();
            let over_budget = output_chars > max_output;
            if over_budget {
                result.terminated = true;
                terminated = true;
            }

            let failed = !result.succeeded();
            let ai_analysis = if failed {
                let ctx = AnalysisContext::command(&step.cmd, result.exit_code, &result.stdout, &result.stderr);
                self.analyzer.analyze(&ctx).await
            } else {
                None
            };

            let record = StepRecord {
                cmd: step.cmd.clone(),
                explain: step.explain.clone(),
                result,
                ai_analysis,
            };
            info!(
                index,
                command = %record.cmd,
                exit_code = record.result.exit_code,
                output_chars,
                "plan step complete"
            );
            emitter.emit(SseFrame::step_complete(index, &record)).await;
            results.push(record);

            if over_budget {
                warn!(output_chars, max_output, "output budget exceeded, plan terminated");
                emitter
                    .emit(SseFrame::error("output budget exceeded; remaining steps skipped"))
                    .await;
                break;
            }
            if failed {
                info!(index, "step failed, remaining steps skipped");
                break;
            }
        }

        PlanOutcome::Done {
            plan,
            safety,
            results,
            terminated,
        }
    }
}
