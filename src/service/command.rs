// Command service: the shared core behind the execute-* request handlers

use super::error::ServiceError;
use super::types::{CodeRequest, CommandResponse, DynamicRequest, LlmResponse, ShellRequest};
use crate::backend::shell::{check_allowed, join, probe_command, validate_shell_name};
use crate::backend::{ExecOptions, ExecutionBackend, ExecutionResult};
use crate::chat::{AnalysisContext, ChatClient, ErrorAdvisor, ErrorAnalysis, FailureKind, NoAnalysis, StepAnalyzer};
use crate::config::AppConfig;
use crate::limits::{LimitConfig, LimitEnforcer, LlmBudget};
use crate::pager::{OutputPager, PageView};
use crate::plan::{InterpreterEngine, LlmPlanner, PlanEngine, PlanError, PlanExecutor, PlanRequest, RunMode};
use crate::policy::SafetyEvaluator;
use crate::registry::{ExecutorRegistry, ExecutorRoute};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, ServiceError>;

const PROBE_TIMEOUT_MS: u64 = 10_000;
const FALLBACK_MODEL: &str = "local-fallback";
const FALLBACK_ANALYSIS: &str = "Non-zero exit. Check command syntax, PATH, and permissions.";

/// Interpreter used for a code language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRuntime {
    pub interpreter: String,
    pub args: Vec<String>,
    pub extension: &'static str,
}

pub const SUPPORTED_LANGUAGES: &[&str] = &["python", "python3", "node", "nodejs", "typescript", "bash", "sh"];

/// Map a language name to its interpreter
pub fn code_runtime(language: &str) -> Option<CodeRuntime> {
    let (interpreter, args, extension): (&str, &[&str], &'static str) =
        match language.trim().to_ascii_lowercase().as_str() {
            "python" | "python3" => ("python3", &[], ".py"),
            "node" | "nodejs" => ("node", &[], ".js"),
            "typescript" => ("npx", &["-y", "ts-node@latest", "-T"], ".ts"),
            "bash" => ("bash", &[], ".sh"),
            "sh" => ("sh", &[], ".sh"),
            _ => return None,
        };
    Some(CodeRuntime {
        interpreter: interpreter.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        extension,
    })
}

fn extension_for(language: &str) -> &'static str {
    code_runtime(language).map(|r| r.extension).unwrap_or(".txt")
}

pub struct CommandService {
    config: Arc<AppConfig>,
    backend: Arc<dyn ExecutionBackend>,
    registry: Arc<ExecutorRegistry>,
    pager: Arc<OutputPager>,
    evaluator: Arc<SafetyEvaluator>,
    budget: Arc<LlmBudget>,
    analyzer: Arc<dyn StepAnalyzer>,
    planner: Option<LlmPlanner>,
    interpreter: InterpreterEngine,
    heartbeat: Duration,
    limits: Option<LimitConfig>,
}

impl CommandService {
    pub fn new(config: AppConfig, backend: Arc<dyn ExecutionBackend>) -> Self {
        let interpreter = InterpreterEngine::new(
            config.llm.interpreter_bin.clone(),
            Duration::from_millis(config.execution.llm_timeout_ms),
        );
        Self {
            registry: Arc::new(ExecutorRegistry::from_config(&config)),
            pager: Arc::new(OutputPager::from_config(&config.pager)),
            evaluator: Arc::new(SafetyEvaluator::from_config(&config.security)),
            budget: Arc::new(LlmBudget::new()),
            analyzer: Arc::new(NoAnalysis),
            planner: None,
            interpreter,
            heartbeat: Duration::from_millis(config.sse.heartbeat_ms),
            limits: None,
            config: Arc::new(config),
            backend,
        }
    }

    /// Enable the chat engine and, when configured, failure analysis
    pub fn with_chat_client(mut self, client: Arc<dyn ChatClient>) -> Self {
        self.analyzer = Arc::new(ErrorAdvisor::new(client.clone(), self.config.llm.auto_analyze_errors));
        self.planner = Some(LlmPlanner::new(client));
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn StepAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Pin limits instead of resolving them per request
    pub fn with_limits(mut self, limits: LimitConfig) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn with_pager(mut self, pager: Arc<OutputPager>) -> Self {
        self.pager = pager;
        self
    }

    pub fn with_interpreter(mut self, interpreter: InterpreterEngine) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn ExecutionBackend> {
        &self.backend
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    pub fn pager(&self) -> &Arc<OutputPager> {
        &self.pager
    }

    pub fn budget(&self) -> &Arc<LlmBudget> {
        &self.budget
    }

    /// Limits for one request: pinned, or layered from config and env
    pub fn limits(&self) -> LimitConfig {
        self.limits
            .clone()
            .unwrap_or_else(|| LimitConfig::resolve(&self.config))
    }

    fn check_input(&self, enforcer: &LimitEnforcer, kind: &str, input: &str) -> Result<String> {
        enforcer
            .enforce_input_limit(kind, input)
            .into_value(input)
            .map_err(ServiceError::InputRejected)
    }

    /// Names and commands of enabled shell executors
    fn enabled_shell_names(&self) -> HashSet<String> {
        self.registry
            .enabled_shells()
            .into_iter()
            .flat_map(|info| [info.name.to_lowercase(), info.cmd.to_lowercase()])
            .collect()
    }

    pub async fn execute_shell(&self, req: ShellRequest) -> Result<CommandResponse> {
        let command = req.command.trim();
        if command.is_empty() {
            return Err(ServiceError::Validation("command is required".to_string()));
        }
        if !self.config.execution.shell.enabled {
            return Err(ServiceError::ShellDisabled("shell execution".to_string()));
        }

        if let Some(shell) = req.shell.as_deref() {
            check_allowed(shell, &self.config.execution.shell.allowed)?;
            let enabled = self.enabled_shell_names();
            if !enabled.is_empty() && !enabled.contains(&shell.to_lowercase()) {
                return Err(ServiceError::ShellDisabled(shell.to_string()));
            }
        }

        let line = if req.args.is_empty() {
            command.to_string()
        } else {
            let mut words = vec![command.to_string()];
            words.extend(req.args.iter().cloned());
            join(&words)
        };

        let enforcer = LimitEnforcer::new(self.limits());
        let line = self.check_input(&enforcer, "shell", &line)?;

        let decision = self.evaluator.evaluate(&line);
        if decision.hard_deny {
            warn!(command = %line, "shell command hard-denied");
            return Err(ServiceError::PolicyBlocked(decision));
        }

        let executor_timeout = req
            .shell
            .as_deref()
            .and_then(|s| self.registry.get(s))
            .and_then(|info| info.timeout_ms);
        let timeout_ms = req
            .timeout_ms
            .or(executor_timeout)
            .unwrap_or(self.config.execution.default_timeout_ms);

        let mut opts = ExecOptions::new().timeout_ms(timeout_ms);
        opts.cwd = req.cwd.clone();
        opts.shell = req.shell.clone();

        let start = Instant::now();
        let raw = self.backend.execute_command(&line, opts).await?;
        info!(
            command = %line,
            shell = ?req.shell,
            exit_code = raw.exit_code,
            timed_out = raw.timed_out,
            duration_ms = start.elapsed().as_millis() as u64,
            "shell command finished"
        );

        let mut ctx = AnalysisContext::command(&line, raw.exit_code, &raw.stdout, &raw.stderr);
        ctx.cwd = req.cwd;
        let mut response = self.finish(&enforcer, raw, Some(ctx)).await;
        if !response.result.succeeded() && response.ai_analysis.is_none() {
            response.ai_analysis = Some(ErrorAnalysis {
                model: FALLBACK_MODEL.to_string(),
                text: FALLBACK_ANALYSIS.to_string(),
            });
        }
        Ok(response)
    }

    pub async fn execute_code(&self, req: CodeRequest) -> Result<CommandResponse> {
        let language = req.language.trim().to_ascii_lowercase();
        let runtime = code_runtime(&language).ok_or_else(|| {
            ServiceError::Validation(format!(
                "unsupported language '{}', supported: {}",
                req.language,
                SUPPORTED_LANGUAGES.join(", ")
            ))
        })?;
        let executor_timeout = self.registry.get(&language).and_then(|info| info.timeout_ms);
        self.run_code(&req.code, &language, runtime, req.timeout_ms, executor_timeout)
            .await
    }

    pub async fn execute_dynamic(&self, name: &str, req: DynamicRequest) -> Result<CommandResponse> {
        match self.registry.route(name)? {
            ExecutorRoute::Shell {
                name,
                shell,
                timeout_ms,
            } => {
                debug!(executor = %name, shell = %shell, "dynamic shell route");
                let command = if req.command.trim().is_empty() {
                    req.code
                } else {
                    req.command
                };
                self.execute_shell(ShellRequest {
                    command,
                    args: req.args,
                    shell: Some(shell),
                    timeout_ms: req.timeout_ms.or(timeout_ms),
                    cwd: None,
                })
                .await
            }
            ExecutorRoute::Code {
                name,
                language,
                interpreter,
                args,
                timeout_ms,
            } => {
                debug!(executor = %name, interpreter = %interpreter, "dynamic code route");
                let runtime = CodeRuntime {
                    interpreter,
                    args,
                    extension: extension_for(&language),
                };
                let code = if req.code.trim().is_empty() {
                    req.command
                } else {
                    req.code
                };
                self.run_code(&code, &language, runtime, req.timeout_ms, timeout_ms)
                    .await
            }
        }
    }

    async fn run_code(
        &self,
        code: &str,
        language: &str,
        runtime: CodeRuntime,
        body_timeout: Option<u64>,
        executor_timeout: Option<u64>,
    ) -> Result<CommandResponse> {
        if code.trim().is_empty() {
            return Err(ServiceError::Validation("code is required".to_string()));
        }
        validate_shell_name(&runtime.interpreter)
            .map_err(|_| ServiceError::Validation(format!("invalid interpreter '{}'", runtime.interpreter)))?;

        let enforcer = LimitEnforcer::new(self.limits());
        let code = self.check_input(&enforcer, "code", code)?;

        if runtime.interpreter != "npx" {
            let probe = self
                .backend
                .execute_command(
                    &probe_command(&runtime.interpreter),
                    ExecOptions::new().timeout_ms(PROBE_TIMEOUT_MS),
                )
                .await?;
            if !probe.succeeded() {
                return Err(ServiceError::Validation(format!(
                    "interpreter '{}' not available",
                    runtime.interpreter
                )));
            }
        }

        let file_name = format!("jit-code-{}{}", Uuid::new_v4().simple(), runtime.extension);
        let path = Path::new(&self.backend.temp_dir())
            .join(file_name)
            .to_string_lossy()
            .into_owned();
        self.backend.create_file(&path, &code, false).await?;

        let timeout_ms = body_timeout
            .or(executor_timeout)
            .unwrap_or(self.config.execution.code_timeout_ms);
        let mut words = vec![runtime.interpreter.clone()];
        words.extend(runtime.args.iter().cloned());
        words.push(path.clone());
        let line = join(&words);

        let start = Instant::now();
        let outcome = self
            .backend
            .execute_command(&line, ExecOptions::new().timeout_ms(timeout_ms))
            .await;
        if let Err(e) = self.backend.remove_file(&path).await {
            warn!(path = %path, error = %e, "failed to remove temp code file");
        }
        let raw = outcome?;
        info!(
            language = %language,
            interpreter = %runtime.interpreter,
            exit_code = raw.exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "code execution finished"
        );

        let ctx = AnalysisContext {
            kind: FailureKind::Code,
            input: code.clone(),
            language: Some(language.to_string()),
            exit_code: raw.exit_code,
            stdout: raw.stdout.clone(),
            stderr: raw.stderr.clone(),
            cwd: None,
        };
        let mut response = self.finish(&enforcer, raw, Some(ctx)).await;
        response.language = Some(language.to_string());
        response.interpreter = Some(runtime.interpreter);
        Ok(response)
    }

    /// Clip, analyze failures and page oversized output
    async fn finish(
        &self,
        enforcer: &LimitEnforcer,
        raw: ExecutionResult,
        ctx: Option<AnalysisContext>,
    ) -> CommandResponse {
        let clipped = enforcer.clip_output(&raw.stdout, &raw.stderr);
        let mut result = ExecutionResult {
            stdout: clipped.stdout,
            stderr: clipped.stderr,
            truncated: raw.truncated || clipped.truncated,
            ..raw
        };

        let ai_analysis = match ctx {
            Some(ctx) if !result.succeeded() => self.analyzer.analyze(&ctx).await,
            _ => None,
        };

        let mut response_id = None;
        let mut total_pages = None;
        if self.pager.exceeds_page(&result.stdout) || self.pager.exceeds_page(&result.stderr) {
            let stored = self.pager.store_response(&result.stdout, &result.stderr);
            if let Ok(first) = self.pager.get_paginated_response(&stored.response_id, 0) {
                result.stdout = first.stdout;
                result.stderr = first.stderr;
            }
            response_id = Some(stored.response_id);
            total_pages = Some(stored.total_pages);
        }

        CommandResponse {
            result,
            ai_analysis,
            response_id,
            total_pages,
            language: None,
            interpreter: None,
        }
    }

    pub fn page(&self, response_id: &str, page: usize) -> Result<PageView> {
        Ok(self.pager.get_by_str(response_id, page)?)
    }

    fn plan_executor(&self, enforcer: LimitEnforcer) -> PlanExecutor {
        PlanExecutor::new(self.backend.clone(), self.evaluator.clone(), enforcer)
            .with_analyzer(self.analyzer.clone())
            .with_heartbeat(self.heartbeat)
            .with_step_timeout(self.config.execution.default_timeout_ms)
    }

    /// Plan instructions with the requested engine and run the plan
    pub async fn execute_llm(&self, req: PlanRequest) -> Result<LlmResponse> {
        let engine: PlanEngine = req
            .engine
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(ServiceError::Validation)?;
        if req.instructions.trim().is_empty() {
            return Err(ServiceError::Validation("instructions are required".to_string()));
        }

        let mode = req.mode();
        if mode == RunMode::Stream {
            if engine == PlanEngine::Interpreter {
                return Err(PlanError::EngineStreamingUnsupported("interpreter".to_string()).into());
            }
            if !self.backend.supports_streaming() {
                return Err(PlanError::StreamingUnsupported(self.backend.protocol()).into());
            }
        }
        if engine == PlanEngine::Chat && self.planner.is_none() {
            return Err(ServiceError::LlmNotConfigured);
        }

        let limits = self.limits();
        let enforcer = LimitEnforcer::new(limits.clone());
        let instructions = self.check_input(&enforcer, "llm", &req.instructions)?;
        let spent = self
            .budget
            .charge(req.cost_usd.unwrap_or(0.0), limits.max_llm_cost_usd)?;
        debug!(spent, engine = ?engine, "llm request admitted");

        let executor = self.plan_executor(enforcer);
        let opts = req.run_options();

        match engine {
            PlanEngine::Interpreter => {
                let model = req
                    .model
                    .clone()
                    .unwrap_or_else(|| self.config.llm.model.clone());
                let (plan, output) = self.interpreter.plan(&instructions, &model).await;
                let outcome = executor.run_sync(plan, opts).await;
                Ok(LlmResponse::Completed {
                    outcome,
                    engine_output: Some(output),
                })
            }
            PlanEngine::Chat => {
                let planner = self.planner.clone().ok_or(ServiceError::LlmNotConfigured)?;
                let cwd = match self.backend.present_working_directory().await {
                    Ok(cwd) => cwd,
                    Err(e) => {
                        warn!(error = %e, "could not resolve working directory for planning");
                        ".".to_string()
                    }
                };
                let model = req.model.clone();

                if mode == RunMode::Stream {
                    let plan = async move {
                        planner
                            .plan(&instructions, model.as_deref(), &cwd)
                            .await
                            .map_err(PlanError::from)
                    };
                    let stream = executor.run_stream_with(plan, opts)?;
                    Ok(LlmResponse::Streaming(stream))
                } else {
                    let plan = planner
                        .plan(&instructions, model.as_deref(), &cwd)
                        .await
                        .map_err(PlanError::from)?;
                    let outcome = executor.run_sync(plan, opts).await;
                    info!(status = outcome.status_name(), steps = outcome.results().len(), "plan finished");
                    Ok(LlmResponse::Completed {
                        outcome,
                        engine_output: None,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_runtime_map() {
        assert_eq!(code_runtime("python").map(|r| r.interpreter), Some("python3".to_string()));
        assert_eq!(code_runtime("NodeJS").map(|r| r.extension), Some(".js"));
        let ts = code_runtime("typescript").unwrap();
        assert_eq!(ts.interpreter, "npx");
        assert_eq!(ts.args, vec!["-y", "ts-node@latest", "-T"]);
        assert!(code_runtime("cobol").is_none());
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(extension_for("bash"), ".sh");
        assert_eq!(extension_for("ruby"), ".txt");
    }
}
