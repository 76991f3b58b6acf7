//! cmdrelay CLI
//!
//! Runs shell commands, code snippets and LLM-authored plans against the
//! configured execution target and prints JSON results.

use clap::{Parser, Subcommand};
use cmdrelay::backend::{self, ExecutionBackend};
use cmdrelay::chat::{ChatConfig, HttpChatClient};
use cmdrelay::config::AppConfig;
use cmdrelay::plan::{PlanOutcome, PlanRequest, PlanStream};
use cmdrelay::service::{CodeRequest, CommandService, LlmResponse, ServiceError, ShellRequest};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// CLI arguments
#[derive(Debug, Parser)]
#[command(name = "cmdrelay")]
#[command(about = "Execute commands and LLM plans on local, ssh or ssm targets")]
struct Args {
    /// Config file (defaults to ~/.cmdrelay/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a shell command
    Exec {
        command: String,
        /// Extra arguments, quoted onto the command
        args: Vec<String>,
        #[arg(long)]
        shell: Option<String>,
        #[arg(long)]
        timeout_ms: Option<u64>,
        #[arg(long)]
        cwd: Option<String>,
    },
    /// Run a source file with a language interpreter
    Code {
        language: String,
        file: PathBuf,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Turn instructions into a command plan and run it
    Plan {
        instructions: String,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        stream: bool,
        #[arg(long)]
        confirm: bool,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        engine: Option<String>,
        #[arg(long)]
        cost_usd: Option<f64>,
    },
    /// Inspect or change executors
    Executors {
        #[command(subcommand)]
        action: ExecutorAction,
    },
}

#[derive(Debug, Subcommand)]
enum ExecutorAction {
    List,
    Enable { name: String },
    Disable { name: String },
    Update {
        name: String,
        #[arg(long)]
        cmd: Option<String>,
        /// Replacement argument list
        #[arg(long, num_args = 0.., allow_hyphen_values = true)]
        args: Option<Vec<String>>,
    },
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!(error = %e, "failed to serialize output"),
    }
}

fn fail(e: ServiceError) -> ! {
    print_json(&serde_json::json!({
        "error": e.to_string(),
        "status": e.status(),
    }));
    process::exit(1);
}

async fn print_stream(mut stream: PlanStream) {
    while let Some(frame) = stream.next_frame().await {
        print!("{}", frame.encode());
    }
}

fn outcome_exit_code(outcome: &PlanOutcome) -> i32 {
    match outcome {
        PlanOutcome::Done { results, .. } if results.iter().all(|r| r.result.succeeded()) => 0,
        _ => 1,
    }
}

async fn run(service: CommandService, command: Command) -> i32 {
    match command {
        Command::Exec {
            command,
            args,
            shell,
            timeout_ms,
            cwd,
        } => {
            let req = ShellRequest {
                command,
                args,
                shell,
                timeout_ms,
                cwd,
            };
            match service.execute_shell(req).await {
                Ok(response) => {
                    print_json(&response);
                    response.result.exit_code
                }
                Err(e) => fail(e),
            }
        }
        Command::Code {
            language,
            file,
            timeout_ms,
        } => {
            let code = match tokio::fs::read_to_string(&file).await {
                Ok(code) => code,
                Err(e) => {
                    error!(file = %file.display(), error = %e, "failed to read source file");
                    return 1;
                }
            };
            let req = CodeRequest {
                code,
                language,
                timeout_ms,
            };
            match service.execute_code(req).await {
                Ok(response) => {
                    print_json(&response);
                    response.result.exit_code
                }
                Err(e) => fail(e),
            }
        }
        Command::Plan {
            instructions,
            dry_run,
            stream,
            confirm,
            model,
            engine,
            cost_usd,
        } => {
            let req = PlanRequest {
                instructions,
                dry_run,
                stream,
                confirm,
                model,
                engine,
                cost_usd,
            };
            match service.execute_llm(req).await {
                Ok(LlmResponse::Streaming(stream)) => {
                    print_stream(stream).await;
                    0
                }
                Ok(LlmResponse::Completed {
                    outcome,
                    engine_output,
                }) => {
                    let code = outcome_exit_code(&outcome);
                    print_json(&serde_json::json!({
                        "status": outcome.http_status(),
                        "outcome": outcome,
                        "engineOutput": engine_output,
                    }));
                    code
                }
                Err(e) => fail(e),
            }
        }
        Command::Executors { action } => {
            let registry = service.registry();
            let changed = match action {
                ExecutorAction::List => {
                    print_json(&registry.list_executors());
                    return 0;
                }
                ExecutorAction::Enable { name } => registry.set_executor_enabled(&name, true),
                ExecutorAction::Disable { name } => registry.set_executor_enabled(&name, false),
                ExecutorAction::Update { name, cmd, args } => registry.update_executor(&name, cmd, args),
            };
            match changed {
                Some(info) => {
                    print_json(&info);
                    0
                }
                None => {
                    warn!("executor not found or nothing to update");
                    print_json(&serde_json::Value::Null);
                    1
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries JSON results, so logs go to stderr
    fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CMDRELAY_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref())?;
    let backend = backend::from_config(&config)?;
    info!(protocol = %backend.protocol(), "Backend initialized");

    let llm_enabled = config.llm.enabled;
    let chat_config = ChatConfig::from_section(&config.llm);
    let mut service = CommandService::new(config, backend);
    if llm_enabled {
        match HttpChatClient::new(chat_config) {
            Ok(client) => service = service.with_chat_client(Arc::new(client)),
            Err(e) => warn!(error = %e, "chat client unavailable, LLM features disabled"),
        }
    }
    let cleanup = service.pager().spawn_cleanup();

    let code = tokio::select! {
        code = run(service, args.command) => code,
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
            130
        }
    };

    cleanup.abort();
    if code != 0 {
        process::exit(code);
    }
    Ok(())
}
