//! Heuristic compatibility ranking between profiles.
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use super::profile::UserProfile;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedProfiles {
    pub ranked_profiles: Vec<String>,
    pub explanation: String,
}

/// Higher is more compatible. Not symmetric: the detail bonus looks at `other` only.
pub fn compatibility_score(user: &UserProfile, other: &UserProfile) -> f64 {
    let mut score = 0.0;

    if let (Some(a), Some(b)) = (user.age, other.age) {
        let diff = (a as f64 - b as f64).abs();
        score += (10.0 - diff * 0.5).max(0.0);
    }

    let user_interests: HashSet<&str> =
        user.relocation_interests.iter().map(String::as_str).collect();
    let other_interests: HashSet<&str> =
        other.relocation_interests.iter().map(String::as_str).collect();
    score += user_interests.intersection(&other_interests).count() as f64 * 5.0;

    // Unset on both sides counts as aligned.
    if user.relocation_timeframe == other.relocation_timeframe {
        score += 15.0;
    } else if user.relocation_timeframe.as_deref() == Some("Next month")
        && other.relocation_timeframe.as_deref() == Some("Next 3 months")
    {
        score += 10.0;
    }

    if user.relocation_status == other.relocation_status {
        score += 10.0;
    }

    if user.nationality != other.nationality {
        score += 5.0;
    }

    if let Some(about_me) = other.about_me.as_deref() {
        let length = about_me.chars().count();
        if length > 100 {
            score += 5.0;
        } else if length > 50 {
            score += 3.0;
        }
    }

    if has_text(&user.university) && has_text(&other.university) {
        score += 5.0;
    }

    debug!(
        "Compatibility score between {} and {}: {}",
        user.display_name(),
        other.display_name(),
        score
    );
    score
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.is_empty())
}

/// Order candidate ids best match first. Ties keep input order.
pub fn rank_profiles(user: &UserProfile, profiles: &[UserProfile]) -> RankedProfiles {
    let mut scored: Vec<(f64, &UserProfile)> = profiles
        .iter()
        .map(|p| (compatibility_score(user, p), p))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let explanation = match scored.first() {
        Some((_, top)) => format!(
            "Profiles have been ranked based on compatibility with your profile. {} appears to be \
             your best match based on shared interests, relocation timeline, and other factors.",
            top.display_name()
        ),
        None => "No profiles were available for ranking.".to_string(),
    };

    let ranked_profiles: Vec<String> = scored.into_iter().map(|(_, p)| p.id.clone()).collect();
    info!("Ranked {} profiles for user {}", ranked_profiles.len(), user.id);
    RankedProfiles { ranked_profiles, explanation }
}
