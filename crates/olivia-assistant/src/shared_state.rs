//! Application state shared by every HTTP handler.
//!
//! Everything is built once at startup and handed out as cheap `Arc` clones.
//! Handlers never hold locks across a turn; the stores serialize their own writes.

use std::sync::Arc;
use tracing::info;

use crate::{
    config::Config,
    context_engine::{ContextWindowManager, TurnOrchestrator},
    llm::{ChatClient, LlmTextGenerator, ToolCallingAgent},
    memory::{ChecklistStore, MessageStore},
    memory_db::MemoryDatabase,
    ranking::SimilarityRanker,
    tools::ChecklistService,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub checklists: Arc<ChecklistService>,
    pub similarity_ranker: Arc<SimilarityRanker>,
    /// Present when backed by SQLite; kept alive so the pool outlives the handlers.
    pub database: Option<Arc<MemoryDatabase>>,
}

impl AppState {
    /// Wire the collaborators on top of the SQLite stores.
    pub fn new(config: Config, database: Arc<MemoryDatabase>) -> anyhow::Result<Self> {
        let messages: Arc<dyn MessageStore> = Arc::new(database.conversations.clone());
        let checklists: Arc<dyn ChecklistStore> = Arc::new(database.checklists.clone());
        let mut state = Self::with_stores(config, messages, checklists)?;
        state.database = Some(database);
        Ok(state)
    }

    /// Wire the collaborators on top of arbitrary stores.
    pub fn with_stores(
        config: Config,
        messages: Arc<dyn MessageStore>,
        checklist_store: Arc<dyn ChecklistStore>,
    ) -> anyhow::Result<Self> {
        let client = Arc::new(ChatClient::new(
            &config.llm_base_url,
            config.openai_api_key.clone(),
            config.llm_timeout_seconds,
        )?);

        let summarizer = Arc::new(LlmTextGenerator::new(
            Arc::clone(&client),
            &config.summarization_llm_model,
            config.summarization_llm_temperature,
        ));
        let window_manager = Arc::new(ContextWindowManager::new(
            Arc::clone(&messages),
            summarizer,
            config.window_config(),
        ));

        let checklists = Arc::new(ChecklistService::new(checklist_store));
        let agent = Arc::new(ToolCallingAgent::new(
            Arc::clone(&client),
            &config.main_llm_model,
            config.main_llm_temperature,
            config.max_tool_rounds,
        ));
        let orchestrator = Arc::new(TurnOrchestrator::new(
            messages,
            Arc::clone(&checklists),
            agent,
            window_manager,
        ));

        let similarity_ranker = Arc::new(SimilarityRanker::new(
            client,
            &config.ranking_llm_model,
            config.ranking_llm_temperature,
        ));

        info!("Application state initialized");
        Ok(Self {
            orchestrator,
            checklists,
            similarity_ranker,
            database: None,
        })
    }
}
