//! Context engine module - conversation history, rolling summaries and turn orchestration

pub mod context_builder;
pub mod history;
pub mod orchestrator;
pub mod prompts;
pub mod window_manager;

pub use context_builder::{format_messages_for_prompt, ContextBuilder};
pub use history::{HistoryReader, HistorySnapshot};
pub use orchestrator::{TurnError, TurnOrchestrator, TurnReply, TurnRequest, TurnStage};
pub use window_manager::{ContextWindowManager, FoldOutcome, FoldStage, WindowConfig};
