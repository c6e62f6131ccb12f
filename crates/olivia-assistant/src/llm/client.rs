//! OpenAI-compatible chat completions client.
//!
//! Speaks `POST {base_url}/v1/chat/completions`, optionally advertising function tools.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallPayload>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: &str) -> Self {
        Self::plain("user", content)
    }

    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.to_string()),
            ..Self::plain("tool", content)
        }
    }

    fn plain(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Tool calls requested by an assistant message, empty when it is a final answer.
    pub fn requested_tool_calls(&self) -> &[ToolCallPayload] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

/// `arguments` is the raw JSON text the model produced; it may not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

pub struct ChatClient {
    base_url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_seconds: u64) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        info!("Chat client initialized with backend: {}", base_url);
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http_client,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// One completion round. Returns the assistant message of the first choice.
    pub async fn complete(
        &self,
        model: &str,
        temperature: f32,
        messages: &[ChatMessage],
        tools: Option<&[Value]>,
    ) -> anyhow::Result<ChatMessage> {
        debug!(
            "Requesting completion from {} ({} messages, tools: {})",
            model,
            messages.len(),
            tools.map(|t| t.len()).unwrap_or(0)
        );
        let request = ChatCompletionRequest {
            model,
            messages,
            temperature,
            tools: tools.filter(|t| !t.is_empty()),
        };

        let mut builder = self.http_client.post(self.completions_url()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("LLM backend request failed: {}", e))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("LLM backend returned {}: {}", status, body));
        }
        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse LLM response: {}", e))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .ok_or_else(|| anyhow::anyhow!("LLM response contained no message"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_complete_sends_bearer_and_parses_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({"model": "gpt-4o-mini"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "hello"}}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let client = ChatClient::new(&server.url(), Some("sk-test".into()), 5).unwrap();
        let reply = client
            .complete("gpt-4o-mini", 0.3, &[ChatMessage::user("hi")], None)
            .await
            .unwrap();

        assert_eq!(reply.content.as_deref(), Some("hello"));
        assert!(reply.requested_tool_calls().is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_parses_tool_calls() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(
                json!({"choices": [{"message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "delete_user_checklist", "arguments": "{}"}
                    }]
                }}]})
                .to_string(),
            )
            .create_async()
            .await;

        let client = ChatClient::new(&server.url(), None, 5).unwrap();
        let reply = client
            .complete("gpt-4o", 0.6, &[ChatMessage::user("delete it")], Some(&[json!({})][..]))
            .await
            .unwrap();

        assert!(reply.content.is_none());
        let calls = reply.requested_tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "delete_user_checklist");
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = ChatClient::new(&server.url(), None, 5).unwrap();
        let err = client
            .complete("gpt-4o", 0.6, &[ChatMessage::user("hi")], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_tool_result_message_serializes_call_id() {
        let value = serde_json::to_value(ChatMessage::tool_result("call_9", "ok")).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_9");
        assert!(value.get("tool_calls").is_none());
    }
}
