use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::memory_db::schema::{
    from_micros, next_timestamp_micros, to_micros, MessageQuery, NewMessage, SortOrder,
    StoredChecklist, StoredMessage,
};

/// Append-only message log, one ordered stream per user.
///
/// Store timestamps are strictly increasing in insertion order. An empty `select`
/// result means "not found" and is never an error.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: NewMessage) -> anyhow::Result<StoredMessage>;
    async fn select(&self, query: &MessageQuery) -> anyhow::Result<Vec<StoredMessage>>;
    async fn delete_user(&self, user_id: &str) -> anyhow::Result<usize>;
}

/// One checklist document per user, replaced wholesale on write.
#[async_trait]
pub trait ChecklistStore: Send + Sync {
    async fn upsert_checklist(&self, user_id: &str, document: &str) -> anyhow::Result<()>;
    async fn select_checklist(&self, user_id: &str) -> anyhow::Result<Option<StoredChecklist>>;
    /// Returns whether a row existed.
    async fn delete_checklist(&self, user_id: &str) -> anyhow::Result<bool>;
}

/// Process-local store used by tests and ephemeral runs.
#[derive(Clone)]
pub struct InMemoryStore {
    messages: Arc<DashMap<String, Vec<StoredMessage>>>,
    checklists: Arc<DashMap<String, StoredChecklist>>,
    next_id: Arc<AtomicI64>,
    last_timestamp: Arc<AtomicI64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue_timestamp(&self) -> i64 {
        let mut current = self.last_timestamp.load(Ordering::SeqCst);
        loop {
            let last = if current == i64::MIN { None } else { Some(current) };
            let next = next_timestamp_micros(last);
            match self.last_timestamp.compare_exchange(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Total rows held for a user, summaries included.
    pub fn row_count(&self, user_id: &str) -> usize {
        self.messages.get(user_id).map(|rows| rows.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            messages: Arc::new(DashMap::new()),
            checklists: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicI64::new(1)),
            last_timestamp: Arc::new(AtomicI64::new(i64::MIN)),
        }
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn insert(&self, message: NewMessage) -> anyhow::Result<StoredMessage> {
        let timestamp = match message.timestamp {
            Some(ts) => ts,
            None => from_micros(self.issue_timestamp()),
        };
        let stored = StoredMessage {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            user_id: message.user_id,
            session_id: message.session_id,
            message_type: message.message_type,
            content: message.content,
            timestamp,
        };
        self.messages
            .entry(stored.user_id.clone())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn select(&self, query: &MessageQuery) -> anyhow::Result<Vec<StoredMessage>> {
        let mut rows: Vec<StoredMessage> = match self.messages.get(&query.user_id) {
            Some(history) => history.iter().filter(|m| query.matches(m)).cloned().collect(),
            None => Vec::new(),
        };
        rows.sort_by_key(|m| (to_micros(m.timestamp), m.id));
        if query.order == SortOrder::Descending {
            rows.reverse();
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn delete_user(&self, user_id: &str) -> anyhow::Result<usize> {
        Ok(self
            .messages
            .remove(user_id)
            .map(|(_, rows)| rows.len())
            .unwrap_or(0))
    }
}

#[async_trait]
impl ChecklistStore for InMemoryStore {
    async fn upsert_checklist(&self, user_id: &str, document: &str) -> anyhow::Result<()> {
        self.checklists.insert(
            user_id.to_string(),
            StoredChecklist {
                user_id: user_id.to_string(),
                document: document.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn select_checklist(&self, user_id: &str) -> anyhow::Result<Option<StoredChecklist>> {
        Ok(self.checklists.get(user_id).map(|c| c.clone()))
    }

    async fn delete_checklist(&self, user_id: &str) -> anyhow::Result<bool> {
        Ok(self.checklists.remove(user_id).is_some())
    }
}
