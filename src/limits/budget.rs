// In-process LLM spend counter. Resets on restart and is not shared across processes.

use super::error::LimitError;
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct LlmBudget {
    spent: Mutex<f64>,
}

impl LlmBudget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spent(&self) -> f64 {
        *self.spent.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add `cost` unless it would push the total past `max`; returns the new total
    pub fn charge(&self, cost: f64, max: Option<f64>) -> Result<f64, LimitError> {
        let cost = if cost.is_finite() && cost > 0.0 { cost } else { 0.0 };
        let mut spent = self.spent.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(max) = max {
            if *spent + cost > max {
                warn!(spent = *spent, cost, max, "llm budget exceeded");
                return Err(LimitError::BudgetExceeded {
                    spent: *spent,
                    cost,
                    max,
                });
            }
        }

        *spent += cost;
        debug!(spent = *spent, cost, "llm budget charged");
        Ok(*spent)
    }
}
