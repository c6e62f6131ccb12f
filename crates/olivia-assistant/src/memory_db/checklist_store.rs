//! Per-user checklist documents
use crate::memory::ChecklistStore;
use crate::memory_db::schema::{from_micros, to_micros, StoredChecklist};
use async_trait::async_trait;
use chrono::Utc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OptionalExtension;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct ChecklistTable {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl ChecklistTable {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    pub fn upsert(&self, user_id: &str, document: &str) -> anyhow::Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO checklists (user_id, document, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET document = excluded.document,
                                                updated_at = excluded.updated_at",
            rusqlite::params![user_id, document, to_micros(Utc::now())],
        )?;
        debug!("Upserted checklist for user {}", user_id);
        Ok(())
    }

    pub fn get(&self, user_id: &str) -> anyhow::Result<Option<StoredChecklist>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT user_id, document, updated_at FROM checklists WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(StoredChecklist {
                        user_id: row.get(0)?,
                        document: row.get(1)?,
                        updated_at: from_micros(row.get(2)?),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn remove(&self, user_id: &str) -> anyhow::Result<bool> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM checklists WHERE user_id = ?1", [user_id])?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl ChecklistStore for ChecklistTable {
    async fn upsert_checklist(&self, user_id: &str, document: &str) -> anyhow::Result<()> {
        self.upsert(user_id, document)
    }

    async fn select_checklist(&self, user_id: &str) -> anyhow::Result<Option<StoredChecklist>> {
        self.get(user_id)
    }

    async fn delete_checklist(&self, user_id: &str) -> anyhow::Result<bool> {
        self.remove(user_id)
    }
}
