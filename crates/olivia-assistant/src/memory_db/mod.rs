//! Memory database module - SQLite-based storage for the message log and user checklists
pub mod schema;
pub mod migration;
pub mod conversation_store;
pub mod checklist_store;
pub use schema::*;
pub use migration::MigrationManager;
pub use conversation_store::ConversationStore;
pub use checklist_store::ChecklistTable;
use std::path::Path;
use std::sync::Arc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

/// Pooled SQLite database holding every persistent table.
pub struct MemoryDatabase {
    pub conversations: ConversationStore,
    pub checklists: ChecklistTable,
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl MemoryDatabase {
    /// Open (or create) a file-backed database and bring its schema up to date.
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        info!("Opening memory database at: {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(|conn| conn.execute_batch("PRAGMA busy_timeout = 5000;"));
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;

        {
            let mut conn = pool.get()?;
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;",
            )?;
            let mut migrator = migration::MigrationManager::new(&mut conn);
            migrator.initialize_database()?;
        }
        info!("Memory database initialized successfully");
        Ok(Self::from_pool(Arc::new(pool)))
    }

    /// Ephemeral database. A single pooled connection, since every new in-memory
    /// connection would otherwise see its own empty database.
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)?;
        {
            let mut conn = pool.get()?;
            migration::MigrationManager::new(&mut conn).initialize_database()?;
        }
        Ok(Self::from_pool(Arc::new(pool)))
    }

    fn from_pool(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self {
            conversations: ConversationStore::new(Arc::clone(&pool)),
            checklists: ChecklistTable::new(Arc::clone(&pool)),
            pool,
        }
    }

    pub fn get_stats(&self) -> anyhow::Result<DatabaseStats> {
        let conn = self.pool.get()?;
        Ok(migration::get_database_stats(&conn)?)
    }
}

impl Drop for MemoryDatabase {
    fn drop(&mut self) {
        if let Ok(conn) = self.pool.get() {
            let _ = conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ChecklistStore, MessageStore};

    #[tokio::test]
    async fn test_stats_reflect_contents() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let first = db
            .conversations
            .insert(NewMessage::human("u1", "s1", "hello"))
            .await
            .unwrap();
        db.conversations.insert(NewMessage::ai("u1", "s1", "hi")).await.unwrap();
        db.conversations
            .insert(NewMessage::summary("u1", "greeting", first.timestamp))
            .await
            .unwrap();
        db.conversations.insert(NewMessage::human("u2", "s2", "hey")).await.unwrap();
        db.checklists.upsert_checklist("u1", "{}").await.unwrap();

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.total_summaries, 1);
        assert_eq!(stats.total_checklists, 1);
    }

    #[test]
    fn test_new_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("olivia.db");
        let _db = MemoryDatabase::new(&path).unwrap();
        assert!(path.exists());
    }
}
