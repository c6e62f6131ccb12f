// Chat API: one conversational turn per request
use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use validator::Validate;

use super::ApiError;
use crate::context_engine::TurnRequest;
use crate::shared_state::AppState;
use crate::tools::ToolCallRecord;

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 256))]
    pub user_id: String,
    #[validate(length(min = 1, max = 256))]
    pub session_id: String,
    #[validate(length(min = 1, max = 65536))]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub user_id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Run a turn. A turn that could not start (message not saved, history unreadable)
/// answers 500 with the reason in `error`; fallback replies are ordinary responses.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), ApiError> {
    request.validate()?;
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("Message cannot be blank"));
    }
    info!(
        "Chat request for user {} session {} ({} chars)",
        request.user_id,
        request.session_id,
        request.message.len()
    );

    let ChatRequest { user_id, session_id, message } = request;
    let turn = TurnRequest {
        user_id: user_id.clone(),
        session_id: session_id.clone(),
        message,
    };

    match state.orchestrator.handle_turn(turn).await {
        Ok(reply) => Ok((
            StatusCode::OK,
            Json(ChatResponse {
                user_id,
                session_id,
                ai_response: Some(reply.reply),
                error: None,
                tool_calls: reply.tool_calls,
            }),
        )),
        Err(e) => {
            error!("Chat turn failed for user {}: {}", user_id, e);
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatResponse {
                    user_id,
                    session_id,
                    ai_response: None,
                    error: Some(e.to_string()),
                    tool_calls: Vec::new(),
                }),
            ))
        }
    }
}
