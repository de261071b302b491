//! SQLite pool for the memory store.
//!
//! One writer connection serializes every mutation (merges repoint rows in a
//! single transaction), while a read-only pool serves graph traversal and
//! candidate search concurrently. WAL mode lets the two proceed side by side.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

const MAX_READERS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Reader/writer pool pair over one database file.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

/// Outcome of a WAL checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointStats {
    /// Pages in the WAL before the checkpoint.
    pub wal_pages: i64,
    /// Pages copied back into the database file.
    pub checkpointed_pages: i64,
}

fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    Ok(SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT)
        .create_if_missing(true))
}

impl DatabasePool {
    /// Open the writer, apply pending migrations, then open the readers.
    ///
    /// Readers are opened after migrating so they never see a partial schema.
    #[tracing::instrument(name = "open_database", skip_all)]
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = connect_options(database_url)?;

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(MAX_READERS)
            .connect_with(options.read_only(true))
            .await?;

        tracing::debug!(max_readers = MAX_READERS, "memory store opened");
        Ok(Self { reader, writer })
    }

    /// Fold the WAL back into the database file and truncate it.
    ///
    /// Worth calling after bulk deletes such as archival and orphan pruning,
    /// which otherwise leave a large WAL behind.
    pub async fn checkpoint(&self) -> Result<CheckpointStats, sqlx::Error> {
        let (_busy, wal_pages, checkpointed_pages): (i64, i64, i64) =
            sqlx::query_as("PRAGMA wal_checkpoint(TRUNCATE)")
                .fetch_one(&self.writer)
                .await?;
        tracing::debug!(wal_pages, checkpointed_pages, "wal checkpoint");
        Ok(CheckpointStats {
            wal_pages,
            checkpointed_pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_url(dir: &tempfile::TempDir, file: &str) -> String {
        format!("sqlite://{}?mode=rwc", dir.path().join(file).display())
    }

    #[tokio::test]
    async fn test_open_migrates_memory_schema() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&db_url(&dir, "memory.db")).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool.reader)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        for expected in [
            "conversation_messages",
            "conversation_summaries",
            "conversations",
            "entities",
            "entity_aliases",
        ] {
            assert!(names.contains(&expected), "{expected} table missing");
        }

        let (journal,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool.writer)
            .await
            .unwrap();
        assert_eq!(journal.to_lowercase(), "wal");

        let (fk,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool.writer)
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data_and_readers_are_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let url = db_url(&dir, "reopen.db");

        let first = DatabasePool::new(&url).await.unwrap();
        sqlx::query(
            "INSERT INTO conversations (id, workspace_id, title, created_at, updated_at) VALUES ('c1', 'w1', NULL, '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z')",
        )
        .execute(&first.writer)
        .await
        .unwrap();
        assert!(
            sqlx::query("DELETE FROM conversations")
                .execute(&first.reader)
                .await
                .is_err()
        );
        first.writer.close().await;
        first.reader.close().await;

        let second = DatabasePool::new(&url).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(&second.reader)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_checkpoint_truncates_wal() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&db_url(&dir, "ckpt.db")).await.unwrap();

        let stats = pool.checkpoint().await.unwrap();
        assert!(stats.checkpointed_pages <= stats.wal_pages);

        let again = pool.checkpoint().await.unwrap();
        assert_eq!(again.wal_pages, 0);
    }
}
