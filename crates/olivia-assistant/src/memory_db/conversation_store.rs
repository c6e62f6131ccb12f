//! SQLite-backed message log: raw chat turns and rolling summaries share one table
use crate::memory::MessageStore;
use crate::memory_db::schema::*;
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params_from_iter, Row, ToSql, TransactionBehavior};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct ConversationStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl ConversationStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    /// Append a row. The timestamp is read-and-assigned inside an immediate transaction so
    /// concurrent writers cannot interleave between "last stamp" and "insert".
    pub fn insert_message(&self, message: NewMessage) -> anyhow::Result<StoredMessage> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let timestamp_us = match message.timestamp {
            Some(ts) => to_micros(ts),
            None => {
                let last: Option<i64> =
                    tx.query_row("SELECT MAX(timestamp) FROM messages", [], |row| row.get(0))?;
                next_timestamp_micros(last)
            }
        };

        tx.execute(
            "INSERT INTO messages (user_id, session_id, message_type, content, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                &message.user_id,
                &message.session_id,
                message.message_type.as_str(),
                &message.content,
                timestamp_us,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(
            "Stored {} message {} for user {}",
            message.message_type, id, message.user_id
        );

        Ok(StoredMessage {
            id,
            user_id: message.user_id,
            session_id: message.session_id,
            message_type: message.message_type,
            content: message.content,
            timestamp: from_micros(timestamp_us),
        })
    }

    pub fn select_messages(&self, query: &MessageQuery) -> anyhow::Result<Vec<StoredMessage>> {
        let conn = self.get_conn()?;

        let mut sql = String::from(
            "SELECT id, user_id, session_id, message_type, content, timestamp
             FROM messages WHERE user_id = ?",
        );
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(query.user_id.clone())];

        match query.message_type {
            TypeFilter::Any => {}
            TypeFilter::Only(t) => {
                sql.push_str(" AND message_type = ?");
                params.push(Box::new(t.as_str()));
            }
            TypeFilter::Except(t) => {
                sql.push_str(" AND message_type != ?");
                params.push(Box::new(t.as_str()));
            }
        }

        if let Some(ts) = query.newer_than {
            sql.push_str(" AND timestamp > ?");
            params.push(Box::new(to_micros(ts)));
        }

        match query.order {
            SortOrder::Ascending => sql.push_str(" ORDER BY timestamp ASC, id ASC"),
            SortOrder::Descending => sql.push_str(" ORDER BY timestamp DESC, id DESC"),
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit.min(i64::MAX as usize) as i64));
        }

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut rows = stmt.query(params_from_iter(param_refs))?;

        let mut messages = Vec::new();
        while let Some(row) = rows.next()? {
            messages.push(Self::row_to_stored_message(row)?);
        }
        Ok(messages)
    }

    pub fn delete_user_messages(&self, user_id: &str) -> anyhow::Result<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM messages WHERE user_id = ?1", [user_id])?;
        info!("Deleted {} messages for user {}", deleted, user_id);
        Ok(deleted)
    }

    #[cfg(test)]
    pub fn count_user_messages(&self, user_id: &str) -> anyhow::Result<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn row_to_stored_message(row: &Row) -> anyhow::Result<StoredMessage> {
        let message_type: String = row.get(3)?;
        Ok(StoredMessage {
            id: row.get(0)?,
            user_id: row.get(1)?,
            session_id: row.get(2)?,
            message_type: message_type.parse()?,
            content: row.get(4)?,
            timestamp: from_micros(row.get(5)?),
        })
    }
}

#[async_trait]
impl MessageStore for ConversationStore {
    async fn insert(&self, message: NewMessage) -> anyhow::Result<StoredMessage> {
        self.insert_message(message)
    }

    async fn select(&self, query: &MessageQuery) -> anyhow::Result<Vec<StoredMessage>> {
        self.select_messages(query)
    }

    async fn delete_user(&self, user_id: &str) -> anyhow::Result<usize> {
        self.delete_user_messages(user_id)
    }
}

#[cfg(test)]
mod tests {
    use crate::memory::MessageStore;
    use crate::memory_db::schema::*;
    use crate::memory_db::MemoryDatabase;

    #[tokio::test]
    async fn test_insert_and_select_round_trip() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let stored = db
            .conversations
            .insert(NewMessage::human("u1", "s1", "hello"))
            .await
            .unwrap();
        assert!(stored.id > 0);

        let rows = db.conversations.select(&MessageQuery::for_user("u1")).await.unwrap();
        assert_eq!(rows, vec![stored]);
    }

    #[tokio::test]
    async fn test_timestamps_strictly_increase_across_rapid_inserts() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        for i in 0..40 {
            let content = format!("m{}", i);
            let msg = if i % 2 == 0 {
                NewMessage::human("u1", "s1", &content)
            } else {
                NewMessage::ai("u1", "s1", &content)
            };
            db.conversations.insert(msg).await.unwrap();
        }
        let rows = db.conversations.select(&MessageQuery::for_user("u1")).await.unwrap();
        assert_eq!(rows.len(), 40);
        for pair in rows.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
            assert!(pair[0].id < pair[1].id);
        }
    }

    #[tokio::test]
    async fn test_filters_by_type_and_newer_than() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = &db.conversations;
        let first = store.insert(NewMessage::human("u1", "s1", "one")).await.unwrap();
        store.insert(NewMessage::ai("u1", "s1", "two")).await.unwrap();
        store
            .insert(NewMessage::summary("u1", "summary", first.timestamp))
            .await
            .unwrap();
        store.insert(NewMessage::human("u1", "s1", "three")).await.unwrap();

        let raw_after_first = store
            .select(
                &MessageQuery::for_user("u1")
                    .except(MessageType::AiSummary)
                    .newer_than(Some(first.timestamp)),
            )
            .await
            .unwrap();
        let contents: Vec<_> = raw_after_first.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"]);

        let latest_summary = store
            .select(
                &MessageQuery::for_user("u1")
                    .only(MessageType::AiSummary)
                    .newest_first()
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(latest_summary.len(), 1);
        assert_eq!(latest_summary[0].session_id, "summary_for_u1");
        assert_eq!(latest_summary[0].timestamp, first.timestamp);
    }

    #[tokio::test]
    async fn test_descending_limit_returns_newest() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        for i in 0..10 {
            db.conversations
                .insert(NewMessage::human("u1", "s1", &format!("m{}", i)))
                .await
                .unwrap();
        }
        let rows = db
            .conversations
            .select(&MessageQuery::for_user("u1").newest_first().limit(3))
            .await
            .unwrap();
        let contents: Vec<_> = rows.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m9", "m8", "m7"]);
    }

    #[tokio::test]
    async fn test_delete_user_and_count() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        db.conversations.insert(NewMessage::human("u1", "s1", "a")).await.unwrap();
        db.conversations.insert(NewMessage::human("u2", "s2", "b")).await.unwrap();

        assert_eq!(db.conversations.delete_user("u1").await.unwrap(), 1);
        assert_eq!(db.conversations.count_user_messages("u1").unwrap(), 0);
        assert_eq!(db.conversations.count_user_messages("u2").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_file_backed_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("olivia.db");
        {
            let db = MemoryDatabase::new(&path).unwrap();
            db.conversations.insert(NewMessage::human("u1", "s1", "kept")).await.unwrap();
        }
        let db = MemoryDatabase::new(&path).unwrap();
        let rows = db.conversations.select(&MessageQuery::for_user("u1")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "kept");
    }
}
