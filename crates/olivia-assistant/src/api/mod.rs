//! API module - HTTP handlers for chat turns, ranking and checklists

pub mod chat_api;
pub mod checklist_api;
pub mod rank_api;

pub use chat_api::{chat, ChatRequest, ChatResponse};
pub use checklist_api::{delete_checklist, get_checklist};
pub use rank_api::{rank, rank_similar, RankProfilesRequest, SimilarProfilesRequest};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::shared_state::AppState;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            Json(json!({
                "error": self.message,
                "code": self.status.as_u16(),
            })),
        )
            .into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::bad_request(format!("Invalid request: {}", errors))
    }
}

/// Liveness plus table counts when SQLite backs the stores.
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let Some(database) = state.database.as_ref() else {
        return Json(json!({ "status": "ok" }));
    };
    match database.get_stats() {
        Ok(stats) => Json(json!({ "status": "ok", "database": stats })),
        Err(e) => {
            warn!("Failed to read database statistics: {}", e);
            Json(json!({ "status": "degraded", "database": null }))
        }
    }
}

/// Prometheus text exposition.
pub async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let body = crate::metrics::render_metrics()
        .map_err(|e| ApiError::internal(format!("Failed to render metrics: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
