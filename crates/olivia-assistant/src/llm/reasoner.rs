//! Tool-calling reasoning loop over chat completions.
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::client::{ChatClient, ChatMessage};
use crate::tools::{ToolCall, ToolCallError, ToolCallRecord, ToolExecutor};

#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub system_prompt: String,
    pub user_input: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReasoningOutput {
    pub final_text: String,
    pub tool_calls_made: Vec<ToolCallRecord>,
}

#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("LLM request failed: {0}")]
    Transport(#[from] anyhow::Error),
    #[error("model produced a tool call that could not be parsed: {0}")]
    MalformedToolCall(String),
    #[error("model returned an empty reply")]
    EmptyReply,
    #[error("model kept calling tools after {0} rounds")]
    ToolRoundsExceeded(usize),
}

/// Produces the assistant's reply, possibly after invoking tools.
#[async_trait]
pub trait ReasoningAgent: Send + Sync {
    async fn run(
        &self,
        request: ReasoningRequest,
        tools: &dyn ToolExecutor,
    ) -> Result<ReasoningOutput, ReasoningError>;
}

pub struct ToolCallingAgent {
    client: Arc<ChatClient>,
    model: String,
    temperature: f32,
    max_rounds: usize,
}

impl ToolCallingAgent {
    pub fn new(client: Arc<ChatClient>, model: &str, temperature: f32, max_rounds: usize) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature,
            max_rounds: max_rounds.max(1),
        }
    }
}

#[async_trait]
impl ReasoningAgent for ToolCallingAgent {
    async fn run(
        &self,
        request: ReasoningRequest,
        tools: &dyn ToolExecutor,
    ) -> Result<ReasoningOutput, ReasoningError> {
        let definitions = tools.definitions();
        let mut messages = vec![
            ChatMessage::system(&request.system_prompt),
            ChatMessage::user(&request.user_input),
        ];
        let mut records = Vec::new();

        for round in 0..self.max_rounds {
            let reply = self
                .client
                .complete(&self.model, self.temperature, &messages, Some(definitions.as_slice()))
                .await?;

            let calls = reply.requested_tool_calls().to_vec();
            if calls.is_empty() {
                let text = reply.content.unwrap_or_default();
                if text.trim().is_empty() {
                    return Err(ReasoningError::EmptyReply);
                }
                debug!("Reasoning finished after {} round(s)", round + 1);
                return Ok(ReasoningOutput { final_text: text, tool_calls_made: records });
            }

            messages.push(reply);
            for payload in calls {
                let name = payload.function.name.as_str();
                let arguments = payload.function.arguments.as_str();
                let (succeeded, result) = match ToolCall::parse(name, arguments) {
                    Ok(call) => match tools.execute(&call).await {
                        Ok(text) => (true, text),
                        Err(e) => {
                            warn!("Tool {} failed: {}", name, e);
                            (false, format!("Error executing {}: {}", name, e))
                        }
                    },
                    Err(ToolCallError::MalformedArguments { reason, .. }) => {
                        return Err(ReasoningError::MalformedToolCall(format!(
                            "{}: {}",
                            name, reason
                        )));
                    }
                    Err(e) => {
                        info!("Rejected tool call from model: {}", e);
                        (false, format!("Error: {}", e))
                    }
                };
                records.push(ToolCallRecord {
                    tool: name.to_string(),
                    arguments: serde_json::from_str(arguments).unwrap_or(Value::Null),
                    succeeded,
                    result: result.clone(),
                });
                messages.push(ChatMessage::tool_result(&payload.id, &result));
            }
        }

        Err(ReasoningError::ToolRoundsExceeded(self.max_rounds))
    }
}
