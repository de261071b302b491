//! ConversationRepository trait definition.
//!
//! Provides CRUD and age/timestamp range queries for conversations,
//! messages, and conversation summaries.

use chrono::{DateTime, Utc};
use mnemo_types::conversation::{Conversation, ConversationMessage, ConversationSummary};
use mnemo_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for conversation, message, and summary persistence.
///
/// Implementations live in mnemo-infra (e.g., `SqliteConversationRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ConversationRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Conversations
    // -----------------------------------------------------------------------

    /// Get a conversation by id.
    fn get_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// Insert or replace a conversation.
    fn save_conversation(
        &self,
        conversation: &Conversation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Conversations created before `cutoff` holding at least `min_messages` messages.
    fn list_conversations_started_before(
        &self,
        cutoff: DateTime<Utc>,
        min_messages: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// Point a conversation at its latest summary.
    fn set_summary_pointer(
        &self,
        conversation_id: &Uuid,
        summary_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Count all conversations.
    fn count_conversations(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// Save a new message.
    fn save_message(
        &self,
        message: &ConversationMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// All messages of a conversation, ordered by created_at ASC.
    fn messages(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationMessage>, RepositoryError>> + Send;

    /// The `limit` most recent messages, ordered by created_at DESC.
    fn recent_messages(
        &self,
        conversation_id: &Uuid,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationMessage>, RepositoryError>> + Send;

    /// Number of messages in a conversation.
    fn count_messages(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u32, RepositoryError>> + Send;

    /// Delete messages created before `cutoff`. Returns the number deleted.
    fn delete_messages_before(
        &self,
        conversation_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Summaries
    // -----------------------------------------------------------------------

    /// Insert or replace a summary.
    fn save_summary(
        &self,
        summary: &ConversationSummary,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// The highest-version summary of a conversation.
    fn get_latest_summary(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ConversationSummary>, RepositoryError>> + Send;

    /// All summaries across conversations.
    fn list_summaries(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationSummary>, RepositoryError>> + Send;

    /// Delete one summary.
    fn delete_summary(
        &self,
        summary_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
