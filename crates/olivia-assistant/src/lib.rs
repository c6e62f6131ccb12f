// olivia-assistant/src/lib.rs

pub mod config;
pub mod context_engine;
pub mod llm;
pub mod memory;
pub mod memory_db;
pub mod metrics;
pub mod ranking;
pub mod telemetry;
pub mod tools;

#[cfg(feature = "cli")]
pub mod api;
#[cfg(feature = "cli")]
pub mod server;
#[cfg(feature = "cli")]
pub mod shared_state;

// Public API exports
pub use config::Config;
pub use context_engine::{
    ContextWindowManager, FoldOutcome, TurnError, TurnOrchestrator, TurnReply, TurnRequest,
};
pub use memory::{ChecklistStore, InMemoryStore, MessageStore};
pub use memory_db::MemoryDatabase;
pub use ranking::{rank_profiles, SimilarityRanker, UserProfile};
pub use tools::ChecklistService;

#[cfg(feature = "cli")]
pub use server::{build_router, run_server};
#[cfg(feature = "cli")]
pub use shared_state::AppState;
