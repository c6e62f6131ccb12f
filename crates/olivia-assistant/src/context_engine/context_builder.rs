//! Assembles the agent's system instruction from history, summary and checklist.

use crate::context_engine::history::HistorySnapshot;
use crate::context_engine::prompts::{
    persona_prompt, NO_CHECKLIST_PLACEHOLDER, NO_MESSAGES_PLACEHOLDER, NO_SUMMARY_PLACEHOLDER,
};
use crate::memory_db::StoredMessage;
use crate::tools::ChecklistRead;
use serde_json::Value;
use tracing::debug;

/// Renders messages one per line as `Human: ...` / `Ai: ...`.
pub fn format_messages_for_prompt(messages: &[StoredMessage]) -> String {
    if messages.is_empty() {
        return NO_MESSAGES_PLACEHOLDER.to_string();
    }
    messages
        .iter()
        .map(|m| format!("{}: {}", m.message_type.prompt_label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pretty-printed checklist, or the placeholder when the user has none.
pub fn format_checklist_for_prompt(checklist: &ChecklistRead) -> String {
    match checklist {
        ChecklistRead::Present(document) => {
            serde_json::to_string_pretty(&Value::Object(document.clone()))
                .unwrap_or_else(|_| NO_CHECKLIST_PLACEHOLDER.to_string())
        }
        ChecklistRead::Absent => NO_CHECKLIST_PLACEHOLDER.to_string(),
    }
}

pub struct ContextBuilder;

impl ContextBuilder {
    /// Build the single system instruction for one turn.
    pub fn build_system_prompt(
        user_id: &str,
        history: &HistorySnapshot,
        checklist: &ChecklistRead,
    ) -> String {
        let summary = history.summary.as_deref().unwrap_or(NO_SUMMARY_PLACEHOLDER);
        let recent = format_messages_for_prompt(&history.messages);
        let checklist = format_checklist_for_prompt(checklist);
        debug!(
            "Built system prompt for user {} ({} recent messages, {} chars of checklist)",
            user_id,
            history.messages.len(),
            checklist.len()
        );

        format!(
            "{}\n\nConversation Summary:\n{}\n\nRecent Messages:\n{}\n\nUser's Current Checklist:\n{}",
            persona_prompt(user_id),
            summary,
            recent,
            checklist
        )
    }
}
