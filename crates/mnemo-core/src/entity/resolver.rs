//! Entity resolution and duplicate detection.
//!
//! Resolution is split into three steps:
//! 1. `search_candidates` -- the only step that touches storage
//! 2. `blend_embedding_scores` -- pure re-scoring with a query embedding
//! 3. `decide` -- pure choice between "matched" and "new"
//!
//! `resolve_entity` never fails: any storage or embedding error downgrades
//! the result to "new entity" with a reduced confidence.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use mnemo_types::config::ResolutionConfig;
use mnemo_types::entity::{DocumentSource, Entity, EntityType, normalize_name, push_source_context};
use mnemo_types::error::MemoryError;
use mnemo_types::resolution::{
    DuplicateGroup, DuplicateMatch, EntityMention, MatchKind, Resolution, ResolutionCandidate,
};
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::repository::entity::EntityRepository;
use crate::similarity::{combined_string_similarity, cosine_similarity};

/// Resolves surface names to existing entities and finds duplicate records.
///
/// Generic over the entity repository and embedder -- mnemo-core never
/// depends on mnemo-infra.
pub struct EntityResolver<R: EntityRepository, E: Embedder> {
    repo: R,
    embedder: Arc<E>,
    config: ResolutionConfig,
}

impl<R: EntityRepository, E: Embedder> EntityResolver<R, E> {
    pub fn new(repo: R, embedder: Arc<E>, config: ResolutionConfig) -> Self {
        Self {
            repo,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Candidates for `name` using the configured fuzzy floor and limit.
    pub async fn find_candidates(
        &self,
        workspace_id: &Uuid,
        name: &str,
        entity_type: Option<EntityType>,
    ) -> Result<Vec<ResolutionCandidate>, MemoryError> {
        self.search_candidates(
            workspace_id,
            name,
            entity_type,
            self.config.fuzzy_threshold,
            self.config.max_candidates,
        )
        .await
    }

    /// Union of the exact, fuzzy, and alias-prefix pools.
    ///
    /// Deduplicated by entity id (keeping the best score), sorted by
    /// similarity DESC, and truncated to `limit`. Exact matches always score
    /// 1.0; the other pools must reach `min_similarity`.
    #[tracing::instrument(
        name = "search_candidates",
        skip(self),
        fields(workspace_id = %workspace_id)
    )]
    pub async fn search_candidates(
        &self,
        workspace_id: &Uuid,
        name: &str,
        entity_type: Option<EntityType>,
        min_similarity: f32,
        limit: usize,
    ) -> Result<Vec<ResolutionCandidate>, MemoryError> {
        let normalized = normalize_name(name);
        if normalized.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut best: HashMap<Uuid, ResolutionCandidate> = HashMap::new();
        let mut offer = |candidate: ResolutionCandidate| match best.get(&candidate.entity.id) {
            Some(existing) if existing.similarity >= candidate.similarity => {}
            _ => {
                best.insert(candidate.entity.id, candidate);
            }
        };

        // Exact: normalized name or alias equality.
        for entity in self
            .repo
            .find_exact(workspace_id, &normalized, entity_type)
            .await?
        {
            offer(ResolutionCandidate {
                entity,
                similarity: 1.0,
                match_kind: MatchKind::Exact,
            });
        }

        // Fuzzy: ordered token pattern, scored by combined string similarity.
        let tokens: Vec<String> = normalized.split_whitespace().map(str::to_string).collect();
        let pool = limit.saturating_mul(3);
        for entity in self
            .repo
            .find_by_name_pattern(workspace_id, &tokens, entity_type, pool)
            .await?
        {
            let similarity = combined_string_similarity(&normalized, &entity.normalized_name);
            if similarity >= min_similarity {
                offer(ResolutionCandidate {
                    entity,
                    similarity,
                    match_kind: MatchKind::Fuzzy,
                });
            }
        }

        // Alias prefix: scored by the best-matching alias.
        for entity in self
            .repo
            .find_by_alias_prefix(workspace_id, &normalized, entity_type, pool)
            .await?
        {
            let similarity = entity
                .aliases
                .iter()
                .map(|alias| combined_string_similarity(&normalized, &normalize_name(alias)))
                .fold(0.0_f32, f32::max);
            if similarity >= min_similarity {
                offer(ResolutionCandidate {
                    entity,
                    similarity,
                    match_kind: MatchKind::AliasPrefix,
                });
            }
        }

        let mut candidates: Vec<ResolutionCandidate> = best.into_values().collect();
        sort_candidates(&mut candidates);
        candidates.truncate(limit);
        Ok(candidates)
    }

    /// Resolve a surface name to an existing entity, or report it as new.
    ///
    /// Never returns an error; failures are logged and reported as a new
    /// entity with `failure_confidence`.
    #[tracing::instrument(
        name = "resolve_entity",
        skip(self, description),
        fields(workspace_id = %workspace_id, entity_type = ?entity_type)
    )]
    pub async fn resolve_entity(
        &self,
        workspace_id: &Uuid,
        name: &str,
        entity_type: Option<EntityType>,
        description: Option<&str>,
    ) -> Resolution {
        match self
            .try_resolve(workspace_id, name, entity_type, description)
            .await
        {
            Ok(resolution) => resolution,
            Err(e) => {
                tracing::warn!(error = %e, name, "entity resolution failed, treating as new");
                Resolution::new_entity(self.config.failure_confidence, Vec::new())
            }
        }
    }

    async fn try_resolve(
        &self,
        workspace_id: &Uuid,
        name: &str,
        entity_type: Option<EntityType>,
        description: Option<&str>,
    ) -> Result<Resolution, MemoryError> {
        let mut candidates = self.find_candidates(workspace_id, name, entity_type).await?;

        if let Some(exact) = candidates.iter().find(|c| {
            c.match_kind == MatchKind::Exact && c.similarity >= self.config.exact_match_threshold
        }) {
            let entity = exact.entity.clone();
            let confidence = exact.similarity;
            return Ok(Resolution::matched(entity, confidence, candidates));
        }

        let description = description.map(str::trim).filter(|d| !d.is_empty());
        if let Some(description) = description
            && candidates.iter().any(|c| !c.entity.embedding.is_empty())
        {
            let query = embedding_text(name, description);
            let query_embedding = self.embedder.embed_query(&query).await?;
            blend_embedding_scores(&mut candidates, &query_embedding, &self.config);
        }

        Ok(decide(candidates, &self.config))
    }

    /// Group entities that look like duplicates of a higher-mention primary.
    ///
    /// Entities are scanned by mentions DESC; an entity already placed in a
    /// group is never revisited. Per-entity failures are logged and skipped.
    #[tracing::instrument(name = "find_duplicates", skip(self), fields(workspace_id = %workspace_id))]
    pub async fn find_duplicates(
        &self,
        workspace_id: &Uuid,
        threshold: Option<f32>,
    ) -> Result<Vec<DuplicateGroup>, MemoryError> {
        let threshold = threshold.unwrap_or(self.config.duplicate_threshold);
        let entities = self.repo.list_by_mentions(workspace_id, None).await?;

        let mut processed: HashSet<Uuid> = HashSet::new();
        let mut groups = Vec::new();

        for entity in &entities {
            if !processed.insert(entity.id) {
                continue;
            }

            let candidates = match self
                .search_candidates(
                    workspace_id,
                    &entity.name,
                    Some(entity.entity_type),
                    threshold,
                    self.config.max_candidates,
                )
                .await
            {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(error = %e, entity_id = %entity.id, "duplicate search failed");
                    continue;
                }
            };

            let duplicates: Vec<DuplicateMatch> = candidates
                .into_iter()
                .filter(|c| c.entity.id != entity.id && !processed.contains(&c.entity.id))
                .map(|c| DuplicateMatch {
                    entity_id: c.entity.id,
                    name: c.entity.name,
                    similarity: c.similarity,
                })
                .collect();

            if duplicates.is_empty() {
                continue;
            }
            for dup in &duplicates {
                processed.insert(dup.entity_id);
            }
            groups.push(DuplicateGroup {
                primary_id: entity.id,
                primary_name: entity.name.clone(),
                duplicates,
            });
        }

        tracing::debug!(groups = groups.len(), "duplicate scan complete");
        Ok(groups)
    }

    /// Resolve a mention and record it on the matched or newly created entity.
    ///
    /// Document mentions bump the per-source count and keep a bounded
    /// context list; conversation mentions bump `conversation_mentions`.
    #[tracing::instrument(
        name = "record_mention",
        skip(self, mention),
        fields(workspace_id = %workspace_id, name = %mention.name)
    )]
    pub async fn record_mention(
        &self,
        workspace_id: &Uuid,
        mention: &EntityMention,
    ) -> Result<Entity, MemoryError> {
        if normalize_name(&mention.name).is_empty() {
            return Err(MemoryError::InvalidInput(
                "mention name cannot be empty".to_string(),
            ));
        }

        let resolution = self
            .resolve_entity(
                workspace_id,
                &mention.name,
                Some(mention.entity_type),
                mention.description.as_deref(),
            )
            .await;

        let mut entity = match resolution.entity {
            Some(existing) => {
                let mut entity = existing;
                entity.add_alias(&mention.name);
                entity
            }
            None => Entity::new(*workspace_id, &mention.name, mention.entity_type),
        };

        apply_mention(&mut entity, mention);
        entity.touch();
        self.repo.save(&entity).await?;

        tracing::debug!(
            entity_id = %entity.id,
            is_new = resolution.is_new,
            total_mentions = entity.stats.total_mentions,
            "mention recorded"
        );
        Ok(entity)
    }
}

/// Text embedded for an entity or a resolution query.
pub fn embedding_text(name: &str, description: &str) -> String {
    let description = description.trim();
    if description.is_empty() {
        name.trim().to_string()
    } else {
        format!("{}: {}", name.trim(), description)
    }
}

/// Re-score candidates that carry an embedding:
/// `string_weight * string + embedding_weight * cosine`.
///
/// Candidates without an embedding keep their string score. Negative cosine
/// similarity is treated as 0.
pub fn blend_embedding_scores(
    candidates: &mut [ResolutionCandidate],
    query_embedding: &[f32],
    config: &ResolutionConfig,
) {
    for candidate in candidates.iter_mut() {
        if candidate.entity.embedding.is_empty() {
            continue;
        }
        let semantic = cosine_similarity(query_embedding, &candidate.entity.embedding).max(0.0);
        candidate.similarity = (config.string_weight * candidate.similarity
            + config.embedding_weight * semantic)
            .clamp(0.0, 1.0);
    }
    sort_candidates(candidates);
}

/// Accept the top candidate if it reaches the fuzzy threshold.
///
/// A new entity is reported with confidence 1.0.
pub fn decide(candidates: Vec<ResolutionCandidate>, config: &ResolutionConfig) -> Resolution {
    match candidates.first() {
        Some(top) if top.similarity >= config.fuzzy_threshold => {
            let entity = top.entity.clone();
            let confidence = top.similarity;
            Resolution::matched(entity, confidence, candidates)
        }
        _ => Resolution::new_entity(1.0, candidates),
    }
}

/// Similarity DESC, exact matches before others at equal score, then total
/// mentions DESC, then name for determinism.
fn sort_candidates(candidates: &mut [ResolutionCandidate]) {
    candidates.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| {
                (b.match_kind == MatchKind::Exact).cmp(&(a.match_kind == MatchKind::Exact))
            })
            .then_with(|| b.entity.stats.total_mentions.cmp(&a.entity.stats.total_mentions))
            .then_with(|| a.entity.normalized_name.cmp(&b.entity.normalized_name))
    });
}

/// Apply a single mention's counters, source, and description.
pub fn apply_mention(entity: &mut Entity, mention: &EntityMention) {
    entity.stats.total_mentions += 1;

    match &mention.source {
        Some(src) => {
            match entity
                .sources
                .iter_mut()
                .find(|s| s.source_id == src.source_id)
            {
                Some(existing) => {
                    existing.mention_count += 1;
                    if let Some(context) = &src.context {
                        push_source_context(existing, context.clone());
                    }
                }
                None => {
                    let mut source = DocumentSource {
                        source_id: src.source_id.clone(),
                        title: src.title.clone(),
                        mention_count: 1,
                        contexts: Vec::new(),
                    };
                    if let Some(context) = &src.context {
                        push_source_context(&mut source, context.clone());
                    }
                    entity.sources.push(source);
                }
            }
            entity.recompute_document_count();
        }
        None => entity.stats.conversation_mentions += 1,
    }

    if entity.description.trim().is_empty()
        && let Some(description) = mention.description.as_deref().map(str::trim)
        && !description.is_empty()
    {
        entity.description = description.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_types::resolution::MentionSource;

    fn candidate(name: &str, similarity: f32, kind: MatchKind) -> ResolutionCandidate {
        ResolutionCandidate {
            entity: Entity::new(Uuid::nil(), name, EntityType::Technology),
            similarity,
            match_kind: kind,
        }
    }

    #[test]
    fn test_decide_accepts_above_threshold() {
        let config = ResolutionConfig::default();
        let resolution = decide(
            vec![candidate("Kubernetes", 0.9, MatchKind::Fuzzy)],
            &config,
        );
        assert!(!resolution.is_new);
        assert_eq!(resolution.entity.unwrap().name, "Kubernetes");
        assert!((resolution.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_decide_new_below_threshold() {
        let config = ResolutionConfig::default();
        let resolution = decide(vec![candidate("Kafka", 0.5, MatchKind::Fuzzy)], &config);
        assert!(resolution.is_new);
        assert!(resolution.entity.is_none());
        assert_eq!(resolution.confidence, 1.0);
        assert_eq!(resolution.candidates.len(), 1);

        let empty = decide(Vec::new(), &config);
        assert!(empty.is_new);
    }

    #[test]
    fn test_sort_puts_exact_ahead_of_tied_fuzzy() {
        let mut popular = candidate("Bank of America of", 1.0, MatchKind::Fuzzy);
        popular.entity.stats.total_mentions = 10;
        let exact = candidate("Bank of America", 1.0, MatchKind::Exact);

        let mut candidates = vec![popular, exact];
        sort_candidates(&mut candidates);
        assert_eq!(candidates[0].match_kind, MatchKind::Exact);
        assert_eq!(candidates[0].entity.name, "Bank of America");
    }

    #[test]
    fn test_blend_embedding_scores_reorders() {
        let config = ResolutionConfig::default();
        let mut close = candidate("Postgres", 0.7, MatchKind::Fuzzy);
        close.entity.embedding = vec![1.0, 0.0];
        let mut far = candidate("Postgrex", 0.75, MatchKind::Fuzzy);
        far.entity.embedding = vec![0.0, 1.0];
        let bare = candidate("PostgreSQL", 0.72, MatchKind::Fuzzy);

        let mut candidates = vec![far, close, bare];
        blend_embedding_scores(&mut candidates, &[1.0, 0.0], &config);

        // 0.6 * 0.7 + 0.4 * 1.0 = 0.82
        assert_eq!(candidates[0].entity.name, "Postgres");
        assert!((candidates[0].similarity - 0.82).abs() < 1e-5);
        // no embedding: unchanged
        assert_eq!(candidates[1].entity.name, "PostgreSQL");
        assert!((candidates[1].similarity - 0.72).abs() < 1e-6);
        // 0.6 * 0.75 + 0.4 * 0.0 = 0.45
        assert!((candidates[2].similarity - 0.45).abs() < 1e-5);
    }

    #[test]
    fn test_apply_mention_document_and_conversation() {
        let mut entity = Entity::new(Uuid::nil(), "Rust", EntityType::Technology);
        let doc_mention = EntityMention {
            name: "Rust".to_string(),
            entity_type: EntityType::Technology,
            description: Some("A systems language".to_string()),
            source: Some(MentionSource {
                source_id: "doc-1".to_string(),
                title: "Intro".to_string(),
                context: Some("written in Rust".to_string()),
            }),
        };
        apply_mention(&mut entity, &doc_mention);
        apply_mention(&mut entity, &doc_mention);

        let chat_mention = EntityMention {
            name: "rust".to_string(),
            entity_type: EntityType::Technology,
            description: None,
            source: None,
        };
        apply_mention(&mut entity, &chat_mention);

        assert_eq!(entity.stats.total_mentions, 3);
        assert_eq!(entity.stats.conversation_mentions, 1);
        assert_eq!(entity.stats.document_count, 1);
        assert_eq!(entity.sources[0].mention_count, 2);
        // duplicate context is not repeated
        assert_eq!(entity.sources[0].contexts.len(), 1);
        assert_eq!(entity.description, "A systems language");
    }

    #[test]
    fn test_embedding_text() {
        assert_eq!(embedding_text("Rust", ""), "Rust");
        assert_eq!(embedding_text(" Rust ", "a language"), "Rust: a language");
    }
}
