//! ContextPruningEngine: assemble a token-bounded context window.
//!
//! Recent turns are "episodic" and always compete for their sub-budget.
//! Older turns become "semantic" only when relevant enough to the query.
//! Selection inside each class is greedy first-fit by score; a message that
//! does not fit is skipped, never truncated.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mnemo_types::config::PruningConfig;
use mnemo_types::context::{ContextMessage, HistoryEntry, MemoryClass, PrunedContext, PruningStats};
use mnemo_types::conversation::ConversationMessage;
use mnemo_types::error::{EmbeddingError, MemoryError};
use uuid::Uuid;

use super::complexity::{effective_budget, estimate_query_complexity};
use super::tokens::estimate_tokens;
use crate::embedding::{Embedder, EmbeddingCache};
use crate::repository::conversation::ConversationRepository;
use crate::similarity::cosine_similarity;

const QUERY_KEY_PREFIX: &str = "query:";
const DOCUMENT_KEY_PREFIX: &str = "doc:";

/// Token sub-budgets for one pruning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budgets {
    pub total: u32,
    pub episodic: u32,
    pub semantic: u32,
    pub summary: u32,
}

/// Split `total` by the configured fractions. The parts never sum past `total`.
pub fn split_budget(total: u32, config: &PruningConfig) -> Budgets {
    let part = |fraction: f32| -> u32 {
        (f64::from(total) * f64::from(fraction.clamp(0.0, 1.0)) + 1e-6).floor() as u32
    };
    let episodic = part(config.episodic_fraction).min(total);
    let semantic = part(config.semantic_fraction).min(total - episodic);
    let summary = part(config.summary_fraction).min(total - episodic - semantic);
    Budgets {
        total,
        episodic,
        semantic,
        summary,
    }
}

/// Builds pruned contexts for live queries.
pub struct ContextPruningEngine<C: ConversationRepository, E: Embedder> {
    conversations: C,
    embedder: Arc<E>,
    cache: EmbeddingCache,
    config: PruningConfig,
}

impl<C: ConversationRepository, E: Embedder> ContextPruningEngine<C, E> {
    pub fn new(conversations: C, embedder: Arc<E>, config: PruningConfig) -> Self {
        Self {
            conversations,
            embedder,
            cache: EmbeddingCache::new(config.embedding_cache_capacity),
            config,
        }
    }

    pub fn config(&self) -> &PruningConfig {
        &self.config
    }

    /// Build a pruned context with the engine's configured budget.
    pub async fn build_pruned_context(
        &self,
        conversation_id: &Uuid,
        query: &str,
    ) -> Result<PrunedContext, MemoryError> {
        self.build_pruned_context_with(conversation_id, query, &self.config)
            .await
    }

    /// Build a pruned context capped at `max_tokens`.
    pub async fn prune_to_token_limit(
        &self,
        conversation_id: &Uuid,
        query: &str,
        max_tokens: u32,
    ) -> Result<PrunedContext, MemoryError> {
        let config = PruningConfig {
            max_total_tokens: max_tokens,
            ..self.config.clone()
        };
        self.build_pruned_context_with(conversation_id, query, &config)
            .await
    }

    /// Build a pruned context with explicit budget knobs.
    #[tracing::instrument(
        name = "build_pruned_context",
        skip(self, query, config),
        fields(conversation_id = %conversation_id, max_total_tokens = config.max_total_tokens)
    )]
    pub async fn build_pruned_context_with(
        &self,
        conversation_id: &Uuid,
        query: &str,
        config: &PruningConfig,
    ) -> Result<PrunedContext, MemoryError> {
        self.conversations
            .get_conversation(conversation_id)
            .await?
            .ok_or(MemoryError::ConversationNotFound(*conversation_id))?;

        let complexity = estimate_query_complexity(query);
        let budgets = split_budget(effective_budget(config.max_total_tokens, complexity), config);

        let messages = self
            .conversations
            .recent_messages(conversation_id, config.scan_limit)
            .await?;
        let scanned = messages.len() as u32;

        let relevances = match self.relevances(query, &messages).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "embedding failed, scoring by recency only");
                vec![0.0; messages.len()]
            }
        };

        let (episodic_pool, semantic_pool) =
            classify_messages(messages, &relevances, Utc::now(), config);

        let (mut episodic, episodic_tokens) = select_greedy(episodic_pool, budgets.episodic);
        let (semantic, semantic_tokens) = select_greedy(semantic_pool, budgets.semantic);
        episodic.sort_by_key(|m| m.message.created_at);

        let summary = self
            .conversations
            .get_latest_summary(conversation_id)
            .await?
            .filter(|s| estimate_tokens(&s.summary) <= budgets.summary);
        let summary_tokens = summary.as_ref().map_or(0, |s| estimate_tokens(&s.summary));

        let selected = (episodic.len() + semantic.len()) as u32;
        let stats = PruningStats {
            candidates_scanned: scanned,
            episodic_count: episodic.len() as u32,
            semantic_count: semantic.len() as u32,
            episodic_tokens,
            semantic_tokens,
            summary_tokens,
            pruned_count: scanned.saturating_sub(selected),
            query_complexity: complexity,
            effective_budget: budgets.total,
        };

        tracing::debug!(
            episodic = stats.episodic_count,
            semantic = stats.semantic_count,
            pruned = stats.pruned_count,
            "context pruned"
        );

        Ok(PrunedContext {
            conversation_id: *conversation_id,
            episodic,
            semantic,
            summary,
            total_tokens: episodic_tokens + semantic_tokens + summary_tokens,
            stats,
        })
    }

    /// Cosine relevance of each message to the query, in message order.
    async fn relevances(
        &self,
        query: &str,
        messages: &[ConversationMessage],
    ) -> Result<Vec<f32>, EmbeddingError> {
        if messages.is_empty() || query.trim().is_empty() {
            return Ok(vec![0.0; messages.len()]);
        }

        let query_key = format!("{QUERY_KEY_PREFIX}{query}");
        let query_embedding = match self.cache.get(&query_key) {
            Some(v) => v,
            None => {
                let v = self.embedder.embed_query(query).await?;
                self.cache.insert(query_key, v.clone());
                v
            }
        };

        let mut fresh: HashMap<String, Vec<f32>> = HashMap::new();
        let mut missing: Vec<String> = Vec::new();
        for message in messages {
            let key = format!("{DOCUMENT_KEY_PREFIX}{}", message.content);
            if self.cache.get(&key).is_none() && !missing.contains(&message.content) {
                missing.push(message.content.clone());
            }
        }
        if !missing.is_empty() {
            let vectors = self.embedder.embed_documents(&missing).await?;
            if vectors.len() != missing.len() {
                return Err(EmbeddingError(format!(
                    "expected {} vectors, got {}",
                    missing.len(),
                    vectors.len()
                )));
            }
            for (text, vector) in missing.into_iter().zip(vectors) {
                self.cache
                    .insert(format!("{DOCUMENT_KEY_PREFIX}{text}"), vector.clone());
                fresh.insert(text, vector);
            }
        }

        Ok(messages
            .iter()
            .map(|m| {
                let embedding = fresh.get(&m.content).cloned().or_else(|| {
                    self.cache
                        .get(&format!("{DOCUMENT_KEY_PREFIX}{}", m.content))
                });
                embedding.map_or(0.0, |e| cosine_similarity(&query_embedding, &e).max(0.0))
            })
            .collect())
    }
}

/// Recency in `[0, 1]`: 1 for a message sent now, 0 at or past the window.
pub fn recency_score(created_at: DateTime<Utc>, now: DateTime<Utc>, window_hours: i64) -> f32 {
    let window_secs = (window_hours.max(1) * 3600) as f64;
    let age_secs = (now - created_at).num_seconds().max(0) as f64;
    (1.0 - (age_secs / window_secs).clamp(0.0, 1.0)) as f32
}

/// Split newest-first messages into episodic and semantic candidates.
///
/// The first `episodic_count` messages are episodic regardless of
/// relevance; the rest qualify as semantic only at or above
/// `min_relevance` and are otherwise dropped.
pub fn classify_messages(
    messages_newest_first: Vec<ConversationMessage>,
    relevances: &[f32],
    now: DateTime<Utc>,
    config: &PruningConfig,
) -> (Vec<ContextMessage>, Vec<ContextMessage>) {
    let mut episodic = Vec::new();
    let mut semantic = Vec::new();

    for (i, message) in messages_newest_first.into_iter().enumerate() {
        let relevance = relevances.get(i).copied().unwrap_or(0.0);
        let recency = recency_score(message.created_at, now, config.recency_window_hours);
        let tokens = estimate_tokens(&message.content);

        if i < config.episodic_count {
            episodic.push(ContextMessage {
                message,
                class: MemoryClass::Episodic,
                relevance,
                recency,
                score: 0.7 * recency + 0.3 * relevance,
                tokens,
            });
        } else if relevance >= config.min_relevance {
            semantic.push(ContextMessage {
                message,
                class: MemoryClass::Semantic,
                relevance,
                recency,
                score: 0.7 * relevance + 0.3 * recency,
                tokens,
            });
        }
    }

    (episodic, semantic)
}

/// Greedy first-fit by score DESC (newer first on ties).
///
/// Returns the selection in score order and the tokens it uses, which never
/// exceed `budget`.
pub fn select_greedy(mut candidates: Vec<ContextMessage>, budget: u32) -> (Vec<ContextMessage>, u32) {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.message.created_at.cmp(&a.message.created_at))
    });

    let mut used = 0u32;
    let mut selected = Vec::new();
    for candidate in candidates {
        if used + candidate.tokens <= budget {
            used += candidate.tokens;
            selected.push(candidate);
        }
    }
    (selected, used)
}

/// Render a pruned context as a prompt section.
pub fn format_for_prompt(context: &PrunedContext) -> String {
    let mut out = String::new();

    if let Some(summary) = &context.summary {
        out.push_str("## Conversation summary\n");
        out.push_str(summary.summary.trim());
        out.push_str("\n\n");
    }

    if !context.semantic.is_empty() {
        out.push_str("## Relevant earlier messages\n");
        for m in &context.semantic {
            let _ = writeln!(out, "[{}] {}", m.message.role, m.message.content.trim());
        }
        out.push('\n');
    }

    if !context.episodic.is_empty() {
        out.push_str("## Recent conversation\n");
        for m in &context.episodic {
            let _ = writeln!(out, "[{}] {}", m.message.role, m.message.content.trim());
        }
    }

    out.trim_end().to_string()
}

/// Flatten a pruned context into chat history order: the summary as a
/// system entry, then semantic and episodic messages chronologically.
pub fn to_chat_history(context: &PrunedContext) -> Vec<HistoryEntry> {
    let mut history = Vec::with_capacity(context.episodic.len() + context.semantic.len() + 1);

    if let Some(summary) = &context.summary {
        history.push(HistoryEntry {
            role: "system".to_string(),
            content: format!("Summary of earlier conversation: {}", summary.summary.trim()),
        });
    }

    let mut semantic: Vec<&ContextMessage> = context.semantic.iter().collect();
    semantic.sort_by_key(|m| m.message.created_at);
    for m in semantic.into_iter().chain(context.episodic.iter()) {
        history.push(HistoryEntry {
            role: m.message.role.to_string(),
            content: m.message.content.clone(),
        });
    }

    history
}
