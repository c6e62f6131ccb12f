//! Reads what the agent sees of a user's past: the latest rolling summary plus the raw
//! messages written after it.
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::memory::MessageStore;
use crate::memory_db::schema::{to_micros, MessageQuery, MessageType, StoredMessage};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySnapshot {
    pub summary: Option<String>,
    pub summary_timestamp: Option<DateTime<Utc>>,
    /// Post-summary window, oldest first.
    pub messages: Vec<StoredMessage>,
}

#[derive(Clone)]
pub struct HistoryReader {
    store: Arc<dyn MessageStore>,
}

impl HistoryReader {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Latest `ai_summary` row, if any.
    pub async fn find_latest_summary(&self, user_id: &str) -> anyhow::Result<Option<StoredMessage>> {
        let query = MessageQuery::for_user(user_id)
            .only(MessageType::AiSummary)
            .newest_first()
            .limit(1);
        Ok(self.store.select(&query).await?.into_iter().next())
    }

    /// Like [`find_latest_summary`](Self::find_latest_summary), but a failed lookup
    /// degrades to "no summary".
    pub async fn latest_summary(&self, user_id: &str) -> Option<StoredMessage> {
        match self.find_latest_summary(user_id).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Failed to read latest summary for user {}: {}", user_id, e);
                None
            }
        }
    }

    /// Up to `max_messages` of the newest non-summary messages strictly after the latest
    /// summary, returned in chronological order. Serves the turn path, so an unreadable
    /// summary is tolerated.
    pub async fn read_history(
        &self,
        user_id: &str,
        max_messages: usize,
    ) -> anyhow::Result<HistorySnapshot> {
        let summary = self.latest_summary(user_id).await;
        self.read_window(user_id, max_messages, summary).await
    }

    /// [`read_history`](Self::read_history) that also fails when the summary cannot be
    /// read. Without the summary the window boundary is unknown.
    pub async fn read_history_strict(
        &self,
        user_id: &str,
        max_messages: usize,
    ) -> anyhow::Result<HistorySnapshot> {
        let summary = self.find_latest_summary(user_id).await?;
        self.read_window(user_id, max_messages, summary).await
    }

    async fn read_window(
        &self,
        user_id: &str,
        max_messages: usize,
        summary: Option<StoredMessage>,
    ) -> anyhow::Result<HistorySnapshot> {
        let summary_timestamp = summary.as_ref().map(|s| s.timestamp);

        let query = MessageQuery::for_user(user_id)
            .except(MessageType::AiSummary)
            .newer_than(summary_timestamp)
            .newest_first()
            .limit(max_messages);
        let mut messages = self.store.select(&query).await?;
        sort_chronologically(&mut messages);

        debug!(
            "History for user {}: summary={}, {} message(s)",
            user_id,
            summary.is_some(),
            messages.len()
        );

        Ok(HistorySnapshot {
            summary: summary.map(|s| s.content),
            summary_timestamp,
            messages,
        })
    }

    /// Oldest `count` messages of the post-summary window.
    pub async fn oldest_after(
        &self,
        user_id: &str,
        after: Option<DateTime<Utc>>,
        count: usize,
    ) -> anyhow::Result<Vec<StoredMessage>> {
        let query = MessageQuery::for_user(user_id)
            .except(MessageType::AiSummary)
            .newer_than(after)
            .oldest_first()
            .limit(count);
        let mut messages = self.store.select(&query).await?;
        sort_chronologically(&mut messages);
        Ok(messages)
    }
}

/// Stores are not trusted to honour the requested order.
fn sort_chronologically(messages: &mut [StoredMessage]) {
    messages.sort_by_key(|m| (to_micros(m.timestamp), m.id));
}
