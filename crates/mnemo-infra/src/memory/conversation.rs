//! In-memory `ConversationRepository`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mnemo_core::repository::conversation::ConversationRepository;
use mnemo_types::conversation::{Conversation, ConversationMessage, ConversationSummary};
use mnemo_types::error::RepositoryError;
use uuid::Uuid;

/// Conversations, their messages, and summaries. Clones share state.
///
/// Summaries are stored independently of conversations, so deleting a
/// conversation leaves its summaries behind as orphans.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationRepository {
    conversations: Arc<DashMap<Uuid, Conversation>>,
    messages: Arc<DashMap<Uuid, Vec<ConversationMessage>>>,
    summaries: Arc<DashMap<Uuid, ConversationSummary>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a conversation and its messages. Summaries are kept.
    pub fn delete_conversation(&self, conversation_id: &Uuid) -> bool {
        self.messages.remove(conversation_id);
        self.conversations.remove(conversation_id).is_some()
    }
}

impl ConversationRepository for InMemoryConversationRepository {
    async fn get_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.conversations.get(conversation_id).map(|r| r.value().clone()))
    }

    async fn save_conversation(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        self.conversations.insert(conversation.id, conversation.clone());
        Ok(())
    }

    async fn list_conversations_started_before(
        &self,
        cutoff: DateTime<Utc>,
        min_messages: u32,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let mut found: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|r| r.created_at < cutoff)
            .filter(|r| {
                let count = self.messages.get(&r.id).map(|m| m.len()).unwrap_or(0);
                count >= min_messages as usize
            })
            .map(|r| r.value().clone())
            .collect();
        found.sort_by_key(|c| c.created_at);
        Ok(found)
    }

    async fn set_summary_pointer(
        &self,
        conversation_id: &Uuid,
        summary_id: &Uuid,
    ) -> Result<(), RepositoryError> {
        let mut entry = self
            .conversations
            .get_mut(conversation_id)
            .ok_or(RepositoryError::NotFound)?;
        entry.summary_id = Some(*summary_id);
        Ok(())
    }

    async fn count_conversations(&self) -> Result<u64, RepositoryError> {
        Ok(self.conversations.len() as u64)
    }

    async fn save_message(&self, message: &ConversationMessage) -> Result<(), RepositoryError> {
        if !self.conversations.contains_key(&message.conversation_id) {
            return Err(RepositoryError::NotFound);
        }
        let mut list = self.messages.entry(message.conversation_id).or_default();
        list.push(message.clone());
        list.sort_by_key(|m| (m.created_at, m.id));
        Ok(())
    }

    async fn messages(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<ConversationMessage>, RepositoryError> {
        Ok(self
            .messages
            .get(conversation_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    async fn recent_messages(
        &self,
        conversation_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<ConversationMessage>, RepositoryError> {
        Ok(self
            .messages
            .get(conversation_id)
            .map(|r| r.iter().rev().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn count_messages(&self, conversation_id: &Uuid) -> Result<u32, RepositoryError> {
        Ok(self
            .messages
            .get(conversation_id)
            .map(|r| r.len() as u32)
            .unwrap_or(0))
    }

    async fn delete_messages_before(
        &self,
        conversation_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let Some(mut list) = self.messages.get_mut(conversation_id) else {
            return Ok(0);
        };
        let before = list.len();
        list.retain(|m| m.created_at >= cutoff);
        Ok((before - list.len()) as u64)
    }

    async fn save_summary(&self, summary: &ConversationSummary) -> Result<(), RepositoryError> {
        self.summaries.insert(summary.id, summary.clone());
        Ok(())
    }

    async fn get_latest_summary(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationSummary>, RepositoryError> {
        Ok(self
            .summaries
            .iter()
            .filter(|r| r.conversation_id == *conversation_id)
            .max_by_key(|r| r.version)
            .map(|r| r.value().clone()))
    }

    async fn list_summaries(&self) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let mut all: Vec<ConversationSummary> =
            self.summaries.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(|s| s.created_at);
        Ok(all)
    }

    async fn delete_summary(&self, summary_id: &Uuid) -> Result<(), RepositoryError> {
        self.summaries
            .remove(summary_id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}
