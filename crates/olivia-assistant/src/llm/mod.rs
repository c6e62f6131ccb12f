//! LLM collaborators: plain text generation (summaries, ranking) and tool-calling reasoning.
pub mod client;
pub mod reasoner;

pub use client::{ChatClient, ChatMessage};
pub use reasoner::{ReasoningAgent, ReasoningError, ReasoningOutput, ReasoningRequest, ToolCallingAgent};

use async_trait::async_trait;
use std::sync::Arc;

/// Single-prompt text completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// [`TextGenerator`] backed by one model on a chat completions endpoint.
pub struct LlmTextGenerator {
    client: Arc<ChatClient>,
    model: String,
    temperature: f32,
}

impl LlmTextGenerator {
    pub fn new(client: Arc<ChatClient>, model: &str, temperature: f32) -> Self {
        Self { client, model: model.to_string(), temperature }
    }
}

#[async_trait]
impl TextGenerator for LlmTextGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let reply = self
            .client
            .complete(&self.model, self.temperature, &[ChatMessage::user(prompt)], None)
            .await?;
        Ok(reply.content.unwrap_or_default())
    }
}
