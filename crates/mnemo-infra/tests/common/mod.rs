#![allow(dead_code)]

use chrono::{DateTime, Utc};
use mnemo_core::embedding::Embedder;
use mnemo_types::conversation::{Conversation, ConversationMessage, MessageRole};
use mnemo_types::entity::{Entity, EntityType, Relationship};
use mnemo_types::error::EmbeddingError;
use uuid::Uuid;

pub fn entity(workspace_id: Uuid, name: &str, entity_type: EntityType, mentions: u32) -> Entity {
    let mut e = Entity::new(workspace_id, name, entity_type);
    e.stats.total_mentions = mentions;
    e
}

pub fn link(from: &mut Entity, to: &Entity, relationship_type: &str, strength: f32) {
    from.relationships.push(Relationship {
        target_entity_id: to.id,
        relationship_type: relationship_type.to_string(),
        strength,
        evidence: None,
    });
}

pub fn conversation(workspace_id: Uuid, created_at: DateTime<Utc>) -> Conversation {
    Conversation {
        id: Uuid::now_v7(),
        workspace_id,
        title: Some("test conversation".to_string()),
        created_at,
        updated_at: created_at,
        summary_id: None,
    }
}

pub fn message(
    conversation_id: Uuid,
    role: MessageRole,
    content: &str,
    created_at: DateTime<Utc>,
) -> ConversationMessage {
    ConversationMessage {
        id: Uuid::now_v7(),
        conversation_id,
        role,
        content: content.to_string(),
        created_at,
    }
}

/// Embedder that always fails, forcing callers onto their fallback path.
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError("model offline".to_string()))
    }

    fn model_name(&self) -> &str {
        "failing"
    }

    fn dimension(&self) -> usize {
        0
    }
}
