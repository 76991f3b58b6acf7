// Chat-engine planner

use super::extract::parse_plan_response;
use super::types::Plan;
use crate::chat::{ChatClient, ChatError, ChatMessage};
use std::sync::Arc;
use tracing::info;

const PLANNER_PROMPT: &str = "You translate natural language instructions into safe, reproducible shell commands. \
Output strictly JSON with shape: {\"commands\":[{\"cmd\":\"...\",\"explain\":\"...\"}]}. \
Prefer POSIX sh/bash. Avoid destructive commands unless explicitly requested. No commentary outside JSON.";

/// Asks the chat model for a command plan
#[derive(Clone)]
pub struct LlmPlanner {
    client: Arc<dyn ChatClient>,
}

impl LlmPlanner {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }

    pub fn messages(instructions: &str, cwd: &str) -> Vec<ChatMessage> {
        let user = serde_json::json!({
            "instructions": instructions,
            "os": std::env::consts::OS,
            "cwd": cwd,
        });
        vec![
            ChatMessage::system(PLANNER_PROMPT),
            ChatMessage::user(user.to_string()),
        ]
    }

    pub async fn plan(&self, instructions: &str, model: Option<&str>, cwd: &str) -> Result<Plan, ChatError> {
        let model = model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(self.client.default_model())
            .to_string();

        let reply = self
            .client
            .chat(Some(&model), Self::messages(instructions, cwd))
            .await?;
        let commands = parse_plan_response(&reply.content);

        info!(
            model = %model,
            provider = %reply.provider,
            commands = commands.len(),
            "plan generated"
        );
        Ok(Plan::new(model, reply.provider, commands))
    }
}
