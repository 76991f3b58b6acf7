// Plan module - LLM-authored command plans, gated and executed step by step

pub mod error;
pub mod events;
pub mod executor;
pub mod extract;
pub mod interpreter;
pub mod planner;
pub mod types;

pub use error::PlanError;
pub use events::{Emitter, PlanStream, SseFrame};
pub use executor::{PlanExecutor, PlanRun};
pub use extract::{extract_candidate_commands, parse_plan_response};
pub use interpreter::InterpreterEngine;
pub use planner::LlmPlanner;
pub use types::{
    BlockReason, Plan, PlanCommand, PlanEngine, PlanOutcome, PlanRequest, RunMode, RunOptions,
    StepRecord,
};
