//! The agent's tool surface: a closed set of checklist operations.
pub mod checklist;

pub use checklist::{ChecklistDocument, ChecklistRead, ChecklistService, DeleteOutcome};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub const WRITE_CHECKLIST_TOOL: &str = "write_user_checklist";
pub const DELETE_CHECKLIST_TOOL: &str = "delete_user_checklist";

#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    /// Full replacement of the user's checklist.
    WriteChecklist { checklist_data: ChecklistDocument },
    DeleteChecklist,
}

#[derive(Debug, Error, PartialEq)]
pub enum ToolCallError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("arguments for {tool} are not valid JSON: {reason}")]
    MalformedArguments { tool: String, reason: String },
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

impl ToolCall {
    /// Decode a model-issued call. Any `user_id` the model includes is ignored; the
    /// executor is already bound to the turn's user.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ToolCallError> {
        if name != WRITE_CHECKLIST_TOOL && name != DELETE_CHECKLIST_TOOL {
            return Err(ToolCallError::UnknownTool(name.to_string()));
        }
        let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };
        let value: Value =
            serde_json::from_str(arguments).map_err(|e| ToolCallError::MalformedArguments {
                tool: name.to_string(),
                reason: e.to_string(),
            })?;
        let Value::Object(mut args) = value else {
            return Err(ToolCallError::InvalidArguments {
                tool: name.to_string(),
                reason: "arguments must be a JSON object".to_string(),
            });
        };

        if name == DELETE_CHECKLIST_TOOL {
            return Ok(ToolCall::DeleteChecklist);
        }
        match args.remove("checklist_data") {
            Some(Value::Object(checklist_data)) => Ok(ToolCall::WriteChecklist { checklist_data }),
            // Some models double-encode nested objects.
            Some(Value::String(encoded)) => match serde_json::from_str::<Value>(&encoded) {
                Ok(Value::Object(checklist_data)) => Ok(ToolCall::WriteChecklist { checklist_data }),
                _ => Err(ToolCallError::InvalidArguments {
                    tool: name.to_string(),
                    reason: "checklist_data must be a JSON object".to_string(),
                }),
            },
            Some(_) => Err(ToolCallError::InvalidArguments {
                tool: name.to_string(),
                reason: "checklist_data must be a JSON object".to_string(),
            }),
            None => Err(ToolCallError::InvalidArguments {
                tool: name.to_string(),
                reason: "missing required field checklist_data".to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::WriteChecklist { .. } => WRITE_CHECKLIST_TOOL,
            ToolCall::DeleteChecklist => DELETE_CHECKLIST_TOOL,
        }
    }
}

/// What the agent did with one tool call, surfaced on the turn reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub arguments: Value,
    pub succeeded: bool,
    pub result: String,
}

/// Executes tool calls on behalf of one user.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Function-tool schemas advertised to the model.
    fn definitions(&self) -> Vec<Value>;
    /// Result text handed back to the model.
    async fn execute(&self, call: &ToolCall) -> anyhow::Result<String>;
}

/// JSON schemas for the two checklist tools, in chat-completions `tools` format.
pub fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "type": "function",
            "function": {
                "name": WRITE_CHECKLIST_TOOL,
                "description": "Writes or overwrites the user's personalized moving checklist. \
                                The whole checklist is replaced, so always send the complete \
                                document. Include a 'title' field.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "checklist_data": {
                            "type": "object",
                            "description": "The full checklist, e.g. {\"title\": \"Move to Berlin\", \"items\": [{\"task\": \"Book flights\", \"done\": false}]}"
                        }
                    },
                    "required": ["checklist_data"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": DELETE_CHECKLIST_TOOL,
                "description": "Deletes the user's personalized moving checklist.",
                "parameters": {"type": "object", "properties": {}}
            }
        }),
    ]
}

/// Checklist tools bound to a single user for the duration of a turn.
pub struct ChecklistToolbox {
    service: Arc<ChecklistService>,
    user_id: String,
}

impl ChecklistToolbox {
    pub fn new(service: Arc<ChecklistService>, user_id: &str) -> Self {
        Self { service, user_id: user_id.to_string() }
    }
}

#[async_trait]
impl ToolExecutor for ChecklistToolbox {
    fn definitions(&self) -> Vec<Value> {
        tool_definitions()
    }

    async fn execute(&self, call: &ToolCall) -> anyhow::Result<String> {
        info!("Executing tool {} for user {}", call.name(), self.user_id);
        crate::metrics::inc_tool_call(call.name());
        match call {
            ToolCall::WriteChecklist { checklist_data } => {
                self.service
                    .write_checklist(&self.user_id, checklist_data.clone())
                    .await?;
                Ok(format!("Checklist successfully saved for user {}.", self.user_id))
            }
            ToolCall::DeleteChecklist => {
                match self.service.delete_checklist(&self.user_id).await? {
                    DeleteOutcome::Deleted => {
                        Ok(format!("Checklist successfully deleted for user {}.", self.user_id))
                    }
                    DeleteOutcome::AlreadyAbsent => Ok(format!(
                        "Checklist for user {} not found or already deleted (operation successful).",
                        self.user_id
                    )),
                }
            }
        }
    }
}
