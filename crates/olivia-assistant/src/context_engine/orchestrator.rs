use crate::context_engine::context_builder::ContextBuilder;
use crate::context_engine::history::HistoryReader;
use crate::context_engine::prompts::{EMPTY_REPLY, GENERIC_APOLOGY_REPLY, REPHRASE_REPLY};
use crate::context_engine::window_manager::{ContextWindowManager, FoldOutcome};
use crate::llm::{ReasoningAgent, ReasoningError, ReasoningRequest};
use crate::memory::MessageStore;
use crate::memory_db::schema::NewMessage;
use crate::tools::{ChecklistRead, ChecklistService, ChecklistToolbox, ToolCallRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Progress of one turn, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Received,
    PersistedInput,
    ContextLoaded,
    Reasoned,
    PersistedOutput,
    SummaryMaintained,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub user_id: String,
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub reply: String,
    pub tool_calls: Vec<ToolCallRecord>,
    /// True when the reply is a fixed apology or the reply could not be persisted.
    pub degraded: bool,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("failed to save your message: {0}")]
    InputNotPersisted(#[source] anyhow::Error),
    #[error("failed to load conversation history: {0}")]
    HistoryUnavailable(#[source] anyhow::Error),
}

/// Fixed user-facing reply for a reasoning failure.
pub fn fallback_reply(error: &ReasoningError) -> &'static str {
    match error {
        ReasoningError::MalformedToolCall(_) | ReasoningError::ToolRoundsExceeded(_) => REPHRASE_REPLY,
        ReasoningError::EmptyReply => EMPTY_REPLY,
        ReasoningError::Transport(_) => GENERIC_APOLOGY_REPLY,
    }
}

/// Runs a conversational turn end to end.
pub struct TurnOrchestrator {
    store: Arc<dyn MessageStore>,
    history: HistoryReader,
    checklists: Arc<ChecklistService>,
    agent: Arc<dyn ReasoningAgent>,
    window_manager: Arc<ContextWindowManager>,
}

impl TurnOrchestrator {
    pub fn new(
        store: Arc<dyn MessageStore>,
        checklists: Arc<ChecklistService>,
        agent: Arc<dyn ReasoningAgent>,
        window_manager: Arc<ContextWindowManager>,
    ) -> Self {
        info!("Turn orchestrator initialized");
        Self {
            history: HistoryReader::new(Arc::clone(&store)),
            store,
            checklists,
            agent,
            window_manager,
        }
    }

    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnReply, TurnError> {
        let TurnRequest { user_id, session_id, message } = request;
        let mut stage = TurnStage::Received;
        debug!("Turn for user {} session {}: {:?}", user_id, session_id, stage);

        if let Err(e) = self
            .store
            .insert(NewMessage::human(&user_id, &session_id, &message))
            .await
        {
            error!("Failed to persist inbound message for user {}: {}", user_id, e);
            crate::metrics::inc_turn("input_not_persisted");
            return Err(TurnError::InputNotPersisted(e));
        }
        stage = TurnStage::PersistedInput;
        debug!("Turn for user {}: {:?}", user_id, stage);

        let max_messages = self.window_manager.config().max_raw_messages;
        let history = match self.history.read_history(&user_id, max_messages).await {
            Ok(history) => history,
            Err(e) => {
                error!("Failed to read history for user {}: {}", user_id, e);
                crate::metrics::inc_turn("history_unavailable");
                return Err(TurnError::HistoryUnavailable(e));
            }
        };
        let checklist = match self.checklists.read_checklist(&user_id).await {
            Ok(checklist) => checklist,
            Err(e) => {
                warn!("Failed to read checklist for user {}: {}", user_id, e);
                ChecklistRead::Absent
            }
        };
        stage = TurnStage::ContextLoaded;
        debug!(
            "Turn for user {}: {:?} ({} recent messages, summary: {})",
            user_id,
            stage,
            history.messages.len(),
            history.summary.is_some()
        );

        let reasoning_request = ReasoningRequest {
            system_prompt: ContextBuilder::build_system_prompt(&user_id, &history, &checklist),
            user_input: message,
        };
        let toolbox = ChecklistToolbox::new(Arc::clone(&self.checklists), &user_id);
        let (reply, tool_calls, mut degraded) =
            match self.agent.run(reasoning_request, &toolbox).await {
                Ok(output) => (output.final_text, output.tool_calls_made, false),
                Err(e) => {
                    warn!("Reasoning failed for user {}: {}", user_id, e);
                    (fallback_reply(&e).to_string(), Vec::new(), true)
                }
            };
        stage = TurnStage::Reasoned;
        debug!("Turn for user {}: {:?} ({} tool calls)", user_id, stage, tool_calls.len());

        match self.store.insert(NewMessage::ai(&user_id, &session_id, &reply)).await {
            Ok(_) => {
                stage = TurnStage::PersistedOutput;
                debug!("Turn for user {}: {:?}", user_id, stage);
            }
            Err(e) => {
                error!("Failed to persist reply for user {}: {}", user_id, e);
                degraded = true;
            }
        }

        let fold = self.window_manager.maintain_summary(&user_id).await;
        if !matches!(fold, FoldOutcome::Failed { .. }) {
            stage = TurnStage::SummaryMaintained;
        }
        debug!("Turn for user {} finished at {:?} (summary: {})", user_id, stage, fold.label());

        crate::metrics::inc_turn(if degraded { "degraded" } else { "ok" });
        Ok(TurnReply { reply, tool_calls, degraded })
    }
}
