// Error types for Limits module

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LimitError {
    #[error("LLM budget exceeded: spent ${spent:.4} + ${cost:.4} > ${max:.4}")]
    BudgetExceeded { spent: f64, cost: f64, max: f64 },
}
