use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::ApiError;
use crate::ranking::{rank_profiles, RankedProfiles, RankedUserProfile, UserProfile};
use crate::shared_state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankProfilesRequest {
    pub user_profile: UserProfile,
    pub profiles: Vec<UserProfile>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarProfilesRequest {
    pub requesting_profile: UserProfile,
    pub candidates: Vec<UserProfile>,
}

#[derive(Debug, Serialize)]
pub struct SimilarProfilesResponse {
    pub ranking: Vec<RankedUserProfile>,
}

/// Heuristic ranking; never calls a model.
pub async fn rank(Json(request): Json<RankProfilesRequest>) -> Json<RankedProfiles> {
    info!(
        "Ranking {} profiles for user {}",
        request.profiles.len(),
        request.user_profile.id
    );
    Json(rank_profiles(&request.user_profile, &request.profiles))
}

pub async fn rank_similar(
    State(state): State<AppState>,
    Json(request): Json<SimilarProfilesRequest>,
) -> Result<Json<SimilarProfilesResponse>, ApiError> {
    if request.requesting_profile.id.is_empty() {
        return Err(ApiError::bad_request("Requesting profile must have an id"));
    }
    let candidates: Vec<UserProfile> = request
        .candidates
        .into_iter()
        .filter(|c| c.id != request.requesting_profile.id)
        .collect();

    let ranking = state
        .similarity_ranker
        .rank_similar(&request.requesting_profile, &candidates)
        .await
        .map_err(|e| {
            error!("Similarity ranking failed: {:#}", e);
            ApiError::internal(format!("Failed to rank profiles: {}", e))
        })?;
    Ok(Json(SimilarProfilesResponse { ranking }))
}
