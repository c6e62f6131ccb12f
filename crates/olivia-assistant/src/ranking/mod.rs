//! Profile ranking: a deterministic compatibility heuristic and an LLM similarity ranker.
pub mod llm_ranker;
pub mod profile;
pub mod scorer;

pub use llm_ranker::{RankedUserProfile, SimilarityRanker, MAX_RANKING_CANDIDATES};
pub use profile::UserProfile;
pub use scorer::{compatibility_score, rank_profiles, RankedProfiles};
