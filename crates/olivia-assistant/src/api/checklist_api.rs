use axum::extract::{Json, Path, State};
use serde_json::{json, Value};
use tracing::error;

use super::ApiError;
use crate::shared_state::AppState;
use crate::tools::{ChecklistRead, DeleteOutcome};

pub async fn get_checklist(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let read = state.checklists.read_checklist(&user_id).await.map_err(|e| {
        error!("Failed to read checklist for user {}: {}", user_id, e);
        ApiError::internal("Failed to read checklist")
    })?;
    match read {
        ChecklistRead::Present(document) => {
            Ok(Json(json!({ "user_id": user_id, "checklist": document })))
        }
        ChecklistRead::Absent => Err(ApiError::not_found(format!(
            "No checklist found for user {}",
            user_id
        ))),
    }
}

pub async fn delete_checklist(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state.checklists.delete_checklist(&user_id).await.map_err(|e| {
        error!("Failed to delete checklist for user {}: {}", user_id, e);
        ApiError::internal("Failed to delete checklist")
    })?;
    Ok(Json(json!({
        "user_id": user_id,
        "deleted": outcome == DeleteOutcome::Deleted,
    })))
}
