//! LLM-backed similarity ranking with a short personalised summary per match.
use anyhow::{anyhow, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::profile::UserProfile;
use crate::llm::{ChatClient, ChatMessage};

pub const MAX_RANKING_CANDIDATES: usize = 50;

lazy_static! {
    static ref CODE_FENCE: Regex =
        Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("valid fence regex");
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedUserProfile {
    pub user_id: String,
    pub full_name: String,
    pub summary: String,
}

pub struct SimilarityRanker {
    client: Arc<ChatClient>,
    model: String,
    temperature: f32,
}

impl SimilarityRanker {
    pub fn new(client: Arc<ChatClient>, model: &str, temperature: f32) -> Self {
        Self { client, model: model.to_string(), temperature }
    }

    /// Ask the model to order `candidates` best match first.
    ///
    /// Only the first [`MAX_RANKING_CANDIDATES`] are considered. Items naming an
    /// unknown candidate, or missing a summary, are dropped.
    pub async fn rank_similar(
        &self,
        requesting: &UserProfile,
        candidates: &[UserProfile],
    ) -> Result<Vec<RankedUserProfile>> {
        let candidates = &candidates[..candidates.len().min(MAX_RANKING_CANDIDATES)];
        if candidates.is_empty() {
            debug!("No candidates to rank for user {}", requesting.id);
            return Ok(Vec::new());
        }

        let name = requesting.first_name();
        let messages = [
            ChatMessage::system(&ranking_system_prompt(requesting, candidates)?),
            ChatMessage::user(&format!(
                "Please rank these users for me, {}, and tell me a bit about why each might be a good connection.",
                name
            )),
        ];

        let reply = self
            .client
            .complete(&self.model, self.temperature, &messages, None)
            .await
            .context("Similarity ranking request failed")?;
        let raw = reply.content.unwrap_or_default();

        let ranked = parse_ranking(&raw, candidates)?;
        info!(
            "Similarity ranking for user {} returned {} of {} candidates",
            requesting.id,
            ranked.len(),
            candidates.len()
        );
        Ok(ranked)
    }
}

fn ranking_system_prompt(requesting: &UserProfile, candidates: &[UserProfile]) -> Result<String> {
    let name = requesting.first_name();
    let candidate_list: Vec<Value> = candidates
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "full_name": c.full_name.as_deref().unwrap_or("This user"),
                "details_string": c.format_for_llm(),
            })
        })
        .collect();
    let candidate_list = serde_json::to_string_pretty(&candidate_list)?;

    Ok(format!(
        "You are Olivia, a helpful AI assistant facilitating connections between users.
Your task is to rank a list of candidate users based on their similarity to {name} (the requesting user).
Consider all aspects of their profiles: age, university, current and desired cities, about me sections, relocation status, timeframe, and interests.

{name}'s profile is:
--- REQUESTING USER ({name}) ---
{profile}
--- END REQUESTING USER ---

Here is a list of candidate users. Each candidate has an 'id', 'full_name', and 'details_string':
--- CANDIDATE USERS ---
{candidate_list}
--- END CANDIDATE USERS ---

Please provide your ranking as a JSON array.
Each object in the array should represent a candidate user and must contain:
1.  \"user_id\": The 'id' of the candidate user from the input.
2.  \"summary\": A concise 1-2 sentence summary, as if you (Olivia) are telling {name} about this match. Use the candidate's first name in the summary. Highlight key similarities or compatibilities.
    Example for a candidate named Priya: \"It seems Priya is also planning a move to Berlin around the same time as you, {name}, and you both love exploring local cafes!\"

The JSON array should be ordered from the best match (most similar) to the least compatible.
Output ONLY the JSON array, with no other text before or after it.
",
        name = name,
        profile = requesting.format_for_llm(),
        candidate_list = candidate_list,
    ))
}

fn strip_code_fence(raw: &str) -> &str {
    match CODE_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    }
}

pub(crate) fn parse_ranking(raw: &str, candidates: &[UserProfile]) -> Result<Vec<RankedUserProfile>> {
    let body = strip_code_fence(raw);
    let parsed: Value = serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(500).collect();
        anyhow!("Error parsing ranking from LLM: {}. LLM response: {}", e, preview)
    })?;
    let items = parsed
        .as_array()
        .ok_or_else(|| anyhow!("LLM did not return a list"))?;

    let names: HashMap<&str, Option<&str>> = candidates
        .iter()
        .map(|c| (c.id.as_str(), c.full_name.as_deref()))
        .collect();

    let mut ranked = Vec::with_capacity(items.len());
    for item in items {
        let user_id = item.get("user_id").and_then(Value::as_str).unwrap_or_default();
        let summary = item.get("summary").and_then(Value::as_str).unwrap_or_default();
        let full_name = names.get(user_id).copied().flatten();

        match full_name {
            Some(full_name) if !summary.is_empty() => ranked.push(RankedUserProfile {
                user_id: user_id.to_string(),
                full_name: full_name.to_string(),
                summary: summary.to_string(),
            }),
            _ => warn!(
                "Skipping ranking item for user_id '{}': full name found: {}, summary present: {}",
                user_id,
                full_name.is_some(),
                !summary.is_empty()
            ),
        }
    }
    Ok(ranked)
}
