//! SQLite conversation repository implementation.
//!
//! Implements `ConversationRepository` from `mnemo-core` with raw queries,
//! private Row structs, and split reader/writer pool usage.

use chrono::{DateTime, Utc};
use mnemo_core::repository::conversation::ConversationRepository;
use mnemo_types::conversation::{
    Conversation, ConversationMessage, ConversationSummary, MessageRole, MessagesCovered,
};
use mnemo_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_uuid, query_err};

/// SQLite-backed implementation of `ConversationRepository`.
#[derive(Clone)]
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    id: String,
    workspace_id: String,
    title: Option<String>,
    summary_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workspace_id: row.try_get("workspace_id")?,
            title: row.try_get("title")?,
            summary_id: row.try_get("summary_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        Ok(Conversation {
            id: parse_uuid(&self.id, "conversation id")?,
            workspace_id: parse_uuid(&self.workspace_id, "workspace_id")?,
            title: self.title,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            summary_id: self
                .summary_id
                .as_deref()
                .map(|s| parse_uuid(s, "summary_id"))
                .transpose()?,
        })
    }
}

struct MessageRow {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ConversationMessage, RepositoryError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ConversationMessage {
            id: parse_uuid(&self.id, "message id")?,
            conversation_id: parse_uuid(&self.conversation_id, "conversation_id")?,
            role,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct SummaryRow {
    id: String,
    conversation_id: String,
    summary: String,
    topics: String,
    key_insights: String,
    messages_start: i64,
    messages_end: i64,
    messages_total: i64,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl SummaryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            summary: row.try_get("summary")?,
            topics: row.try_get("topics")?,
            key_insights: row.try_get("key_insights")?,
            messages_start: row.try_get("messages_start")?,
            messages_end: row.try_get("messages_end")?,
            messages_total: row.try_get("messages_total")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_summary(self) -> Result<ConversationSummary, RepositoryError> {
        let topics: Vec<String> = serde_json::from_str(&self.topics)
            .map_err(|e| RepositoryError::Query(format!("invalid topics: {e}")))?;
        let key_insights: Vec<String> = serde_json::from_str(&self.key_insights)
            .map_err(|e| RepositoryError::Query(format!("invalid key_insights: {e}")))?;

        Ok(ConversationSummary {
            id: parse_uuid(&self.id, "summary id")?,
            conversation_id: parse_uuid(&self.conversation_id, "conversation_id")?,
            summary: self.summary,
            topics,
            key_insights,
            messages_covered: MessagesCovered {
                start: self.messages_start as u32,
                end: self.messages_end as u32,
                total: self.messages_total as u32,
            },
            version: self.version as u32,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn collect_messages(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<ConversationMessage>, RepositoryError> {
    let mut messages = Vec::with_capacity(rows.len());
    for row in rows {
        let message_row = MessageRow::from_row(row).map_err(query_err)?;
        messages.push(message_row.into_message()?);
    }
    Ok(messages)
}

// ---------------------------------------------------------------------------
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn get_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(conversation_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let conversation_row = ConversationRow::from_row(&row).map_err(query_err)?;
                Ok(Some(conversation_row.into_conversation()?))
            }
            None => Ok(None),
        }
    }

    async fn save_conversation(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO conversations (id, workspace_id, title, summary_id, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   workspace_id = excluded.workspace_id,
                   title = excluded.title,
                   summary_id = excluded.summary_id,
                   updated_at = excluded.updated_at"#,
        )
        .bind(conversation.id.to_string())
        .bind(conversation.workspace_id.to_string())
        .bind(&conversation.title)
        .bind(conversation.summary_id.map(|id| id.to_string()))
        .bind(format_datetime(&conversation.created_at))
        .bind(format_datetime(&conversation.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn list_conversations_started_before(
        &self,
        cutoff: DateTime<Utc>,
        min_messages: u32,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT c.* FROM conversations c
               WHERE c.created_at < ?
                 AND (SELECT COUNT(*) FROM conversation_messages m
                      WHERE m.conversation_id = c.id) >= ?
               ORDER BY c.created_at ASC"#,
        )
        .bind(format_datetime(&cutoff))
        .bind(i64::from(min_messages))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in &rows {
            let conversation_row = ConversationRow::from_row(row).map_err(query_err)?;
            conversations.push(conversation_row.into_conversation()?);
        }
        Ok(conversations)
    }

    async fn set_summary_pointer(
        &self,
        conversation_id: &Uuid,
        summary_id: &Uuid,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE conversations SET summary_id = ? WHERE id = ?")
            .bind(summary_id.to_string())
            .bind(conversation_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn count_conversations(&self) -> Result<u64, RepositoryError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)?;
        Ok(row.0 as u64)
    }

    async fn save_message(&self, message: &ConversationMessage) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO conversation_messages (id, conversation_id, role, content, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.conversation_id.to_string())
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(format_datetime(&message.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn messages(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<ConversationMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM conversation_messages WHERE conversation_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        collect_messages(&rows)
    }

    async fn recent_messages(
        &self,
        conversation_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<ConversationMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM conversation_messages WHERE conversation_id = ?
               ORDER BY created_at DESC, id DESC LIMIT ?"#,
        )
        .bind(conversation_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        collect_messages(&rows)
    }

    async fn count_messages(&self, conversation_id: &Uuid) -> Result<u32, RepositoryError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM conversation_messages WHERE conversation_id = ?")
                .bind(conversation_id.to_string())
                .fetch_one(&self.pool.reader)
                .await
                .map_err(query_err)?;
        Ok(row.0 as u32)
    }

    async fn delete_messages_before(
        &self,
        conversation_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM conversation_messages WHERE conversation_id = ? AND created_at < ?",
        )
        .bind(conversation_id.to_string())
        .bind(format_datetime(&cutoff))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(result.rows_affected())
    }

    async fn save_summary(&self, summary: &ConversationSummary) -> Result<(), RepositoryError> {
        let topics = serde_json::to_string(&summary.topics).map_err(query_err)?;
        let key_insights = serde_json::to_string(&summary.key_insights).map_err(query_err)?;

        sqlx::query(
            r#"INSERT INTO conversation_summaries (id, conversation_id, summary, topics, key_insights,
                   messages_start, messages_end, messages_total, version, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   summary = excluded.summary,
                   topics = excluded.topics,
                   key_insights = excluded.key_insights,
                   messages_start = excluded.messages_start,
                   messages_end = excluded.messages_end,
                   messages_total = excluded.messages_total,
                   version = excluded.version,
                   updated_at = excluded.updated_at"#,
        )
        .bind(summary.id.to_string())
        .bind(summary.conversation_id.to_string())
        .bind(&summary.summary)
        .bind(topics)
        .bind(key_insights)
        .bind(i64::from(summary.messages_covered.start))
        .bind(i64::from(summary.messages_covered.end))
        .bind(i64::from(summary.messages_covered.total))
        .bind(i64::from(summary.version))
        .bind(format_datetime(&summary.created_at))
        .bind(format_datetime(&summary.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn get_latest_summary(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationSummary>, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT * FROM conversation_summaries WHERE conversation_id = ?
               ORDER BY version DESC LIMIT 1"#,
        )
        .bind(conversation_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_err)?;

        match row {
            Some(row) => {
                let summary_row = SummaryRow::from_row(&row).map_err(query_err)?;
                Ok(Some(summary_row.into_summary()?))
            }
            None => Ok(None),
        }
    }

    async fn list_summaries(&self) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM conversation_summaries ORDER BY created_at ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let summary_row = SummaryRow::from_row(row).map_err(query_err)?;
            summaries.push(summary_row.into_summary()?);
        }
        Ok(summaries)
    }

    async fn delete_summary(&self, summary_id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM conversation_summaries WHERE id = ?")
            .bind(summary_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
