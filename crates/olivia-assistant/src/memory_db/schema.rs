//! Database schema definitions for the conversation store
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who produced a row in the message log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Human,
    Ai,
    /// Reserved type for rolling summaries; never part of the raw window.
    AiSummary,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Human => "human",
            MessageType::Ai => "ai",
            MessageType::AiSummary => "ai_summary",
        }
    }

    /// Label used when a message is rendered into a prompt.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            MessageType::Human => "Human",
            MessageType::Ai => "Ai",
            MessageType::AiSummary => "Ai_summary",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(MessageType::Human),
            "ai" => Ok(MessageType::Ai),
            "ai_summary" => Ok(MessageType::AiSummary),
            other => Err(anyhow::anyhow!("Unknown message type: {}", other)),
        }
    }
}

/// A row of the per-user message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub user_id: String,
    pub session_id: String,
    pub message_type: MessageType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A message about to be appended.
///
/// `timestamp` is normally left empty so the store assigns the next strictly increasing
/// stamp. Summary rows carry an explicit anchor (the timestamp of the last folded message).
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub user_id: String,
    pub session_id: String,
    pub message_type: MessageType,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewMessage {
    pub fn human(user_id: &str, session_id: &str, content: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            message_type: MessageType::Human,
            content: content.to_string(),
            timestamp: None,
        }
    }

    pub fn ai(user_id: &str, session_id: &str, content: &str) -> Self {
        Self {
            message_type: MessageType::Ai,
            ..Self::human(user_id, session_id, content)
        }
    }

    pub fn summary(user_id: &str, content: &str, anchor: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            session_id: summary_session_id(user_id),
            message_type: MessageType::AiSummary,
            content: content.to_string(),
            timestamp: Some(anchor),
        }
    }
}

/// Session id under which a user's summaries are filed.
pub fn summary_session_id(user_id: &str) -> String {
    format!("summary_for_{}", user_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilter {
    Any,
    Only(MessageType),
    Except(MessageType),
}

impl TypeFilter {
    pub fn matches(&self, message_type: MessageType) -> bool {
        match self {
            TypeFilter::Any => true,
            TypeFilter::Only(t) => *t == message_type,
            TypeFilter::Except(t) => *t != message_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Query surface over the message log: equality on user, (in)equality on type,
/// greater-than on timestamp, ordering and an optional limit.
#[derive(Debug, Clone)]
pub struct MessageQuery {
    pub user_id: String,
    pub message_type: TypeFilter,
    pub newer_than: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl MessageQuery {
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            message_type: TypeFilter::Any,
            newer_than: None,
            order: SortOrder::Ascending,
            limit: None,
        }
    }

    pub fn only(mut self, message_type: MessageType) -> Self {
        self.message_type = TypeFilter::Only(message_type);
        self
    }

    pub fn except(mut self, message_type: MessageType) -> Self {
        self.message_type = TypeFilter::Except(message_type);
        self
    }

    pub fn newer_than(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.newer_than = timestamp;
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.order = SortOrder::Ascending;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, message: &StoredMessage) -> bool {
        message.user_id == self.user_id
            && self.message_type.matches(message.message_type)
            && self.newer_than.map_or(true, |ts| message.timestamp > ts)
    }
}

/// The single checklist row a user may own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChecklist {
    pub user_id: String,
    /// Raw JSON text exactly as written; parsing is the checklist service's concern.
    pub document: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub total_users: i64,
    pub total_messages: i64,
    pub total_summaries: i64,
    pub total_checklists: i64,
    pub database_size_bytes: i64,
}

pub fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

pub fn from_micros(micros: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(micros).single().unwrap_or_default()
}

/// Next store-assigned stamp: wall clock, bumped past the last issued value so that
/// insertion order and timestamp order never disagree.
pub fn next_timestamp_micros(last_issued: Option<i64>) -> i64 {
    let now = Utc::now().timestamp_micros();
    match last_issued {
        Some(last) if now <= last => last + 1,
        _ => now,
    }
}

pub const SCHEMA_SQL: &str = "
-- Message log (raw messages and rolling summaries)
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    message_type TEXT NOT NULL CHECK (message_type IN ('human', 'ai', 'ai_summary')),
    content TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);
-- Checklists: one document per user
CREATE TABLE IF NOT EXISTS checklists (
    user_id TEXT PRIMARY KEY,
    document TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_messages_user_ts ON messages (user_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_user_type_ts ON messages (user_id, message_type, timestamp);
";
