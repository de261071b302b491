//! Pruned conversation context types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

use crate::conversation::{ConversationMessage, ConversationSummary};

/// Why a message was selected into the context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryClass {
    /// One of the most recent turns, kept for continuity.
    Episodic,
    /// An older turn kept for topical relevance to the query.
    Semantic,
}

impl fmt::Display for MemoryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryClass::Episodic => write!(f, "episodic"),
            MemoryClass::Semantic => write!(f, "semantic"),
        }
    }
}

/// A scored message selected for the context window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMessage {
    pub message: ConversationMessage,
    pub class: MemoryClass,
    pub relevance: f32,
    pub recency: f32,
    pub score: f32,
    pub tokens: u32,
}

/// Per-class selection statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PruningStats {
    pub candidates_scanned: u32,
    pub episodic_count: u32,
    pub semantic_count: u32,
    pub episodic_tokens: u32,
    pub semantic_tokens: u32,
    pub summary_tokens: u32,
    /// Scanned messages that did not make it into the window.
    pub pruned_count: u32,
    pub query_complexity: f32,
    pub effective_budget: u32,
}

/// A token-bounded slice of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrunedContext {
    pub conversation_id: Uuid,
    /// Chronological order.
    pub episodic: Vec<ContextMessage>,
    /// Descending score order.
    pub semantic: Vec<ContextMessage>,
    pub summary: Option<ConversationSummary>,
    pub total_tokens: u32,
    pub stats: PruningStats,
}

/// A role/content pair in chat-history shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}
