//! Entity merging, terminology normalization, and embedding generation.
//!
//! A merge persists in this order: repoint inbound relationships, save the
//! primary, then delete the duplicates. An interrupted merge can therefore
//! leave duplicate records behind but never a live edge into a deleted id.

use std::collections::HashMap;
use std::sync::Arc;

use mnemo_types::config::MergeConfig;
use mnemo_types::entity::{Entity, normalize_name};
use mnemo_types::error::{EmbeddingError, MemoryError};
use mnemo_types::resolution::{
    AutoMergeReport, DuplicateGroup, EmbeddingBatchReport, NormalizationReport,
};
use uuid::Uuid;

use super::merge_strategy::{drop_edges_into, merge_into};
use super::resolver::embedding_text;
use super::{ensure_workspace, load_in_workspace};
use crate::embedding::Embedder;
use crate::repository::entity::EntityRepository;

/// Merges duplicate entity records and maintains entity embeddings.
pub struct EntityMerger<R: EntityRepository, E: Embedder> {
    repo: R,
    embedder: Arc<E>,
    config: MergeConfig,
}

impl<R: EntityRepository, E: Embedder> EntityMerger<R, E> {
    pub fn new(repo: R, embedder: Arc<E>, config: MergeConfig) -> Self {
        Self {
            repo,
            embedder,
            config,
        }
    }

    /// Fold `duplicate_ids` into `primary_id` and delete the duplicates.
    ///
    /// Every id must exist and belong to `workspace_id`. Returns the
    /// persisted primary.
    #[tracing::instrument(
        name = "merge_entities",
        skip(self, duplicate_ids),
        fields(
            workspace_id = %workspace_id,
            primary_id = %primary_id,
            duplicate_count = duplicate_ids.len(),
        )
    )]
    pub async fn merge_entities(
        &self,
        workspace_id: &Uuid,
        primary_id: &Uuid,
        duplicate_ids: &[Uuid],
    ) -> Result<Entity, MemoryError> {
        if duplicate_ids.contains(primary_id) {
            return Err(MemoryError::InvalidInput(
                "an entity cannot be merged into itself".to_string(),
            ));
        }

        let mut primary = load_in_workspace(&self.repo, workspace_id, primary_id).await?;
        if duplicate_ids.is_empty() {
            return Ok(primary);
        }

        let mut dup_ids: Vec<Uuid> = duplicate_ids.to_vec();
        dup_ids.sort();
        dup_ids.dedup();

        let duplicates = self.repo.get_many(&dup_ids).await?;
        for id in &dup_ids {
            match duplicates.iter().find(|d| d.id == *id) {
                Some(dup) => ensure_workspace(dup, workspace_id)?,
                None => return Err(MemoryError::EntityNotFound(*id)),
            }
        }

        for duplicate in &duplicates {
            merge_into(&mut primary, duplicate, self.config.contexts_per_merge);
        }
        drop_edges_into(&mut primary, &dup_ids);

        let repointed = self
            .repo
            .repoint_relationships(workspace_id, &dup_ids, primary_id)
            .await?;

        primary.touch();
        self.repo.save(&primary).await?;
        let deleted = self.repo.delete_many(&dup_ids).await?;

        tracing::info!(
            repointed,
            deleted,
            total_mentions = primary.stats.total_mentions,
            "entities merged"
        );
        Ok(primary)
    }

    /// Merge every group whose duplicates all meet `threshold`.
    ///
    /// Groups below threshold are skipped; failing groups are counted and
    /// logged, never aborting the batch.
    #[tracing::instrument(
        name = "auto_merge_duplicates",
        skip(self, groups),
        fields(workspace_id = %workspace_id, group_count = groups.len())
    )]
    pub async fn auto_merge_duplicates(
        &self,
        workspace_id: &Uuid,
        groups: &[DuplicateGroup],
        threshold: Option<f32>,
    ) -> AutoMergeReport {
        let threshold = threshold.unwrap_or(self.config.auto_merge_threshold);
        let mut report = AutoMergeReport::default();

        for group in groups {
            if group.duplicates.is_empty() || group.min_similarity() < threshold {
                report.groups_skipped += 1;
                continue;
            }

            let ids: Vec<Uuid> = group.duplicates.iter().map(|d| d.entity_id).collect();
            match self.merge_entities(workspace_id, &group.primary_id, &ids).await {
                Ok(_) => {
                    report.groups_merged += 1;
                    report.entities_merged += ids.len() as u32;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        primary_id = %group.primary_id,
                        "auto-merge of duplicate group failed"
                    );
                    report.errors += 1;
                }
            }
        }

        report
    }

    /// Rename entities known by a variant term to its canonical form.
    ///
    /// Each `variant -> canonical` pair matches entities whose name or alias
    /// equals the variant. The old name is kept as an alias, which makes a
    /// second run report every entity as already canonical.
    #[tracing::instrument(
        name = "normalize_terminology",
        skip(self, mappings),
        fields(workspace_id = %workspace_id, mapping_count = mappings.len())
    )]
    pub async fn normalize_terminology(
        &self,
        workspace_id: &Uuid,
        mappings: &HashMap<String, String>,
    ) -> NormalizationReport {
        let mut report = NormalizationReport::default();

        for (variant, canonical) in mappings {
            let variant_norm = normalize_name(variant);
            let canonical_norm = normalize_name(canonical);
            if variant_norm.is_empty() || canonical_norm.is_empty() {
                report.errors += 1;
                continue;
            }

            let matches = match self.repo.find_exact(workspace_id, &variant_norm, None).await {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(error = %e, variant = %variant, "terminology lookup failed");
                    report.errors += 1;
                    continue;
                }
            };

            for mut entity in matches {
                if entity.normalized_name == canonical_norm {
                    report.already_canonical += 1;
                    continue;
                }

                let old_name = entity.name.clone();
                entity.rename(canonical);
                entity
                    .aliases
                    .retain(|a| normalize_name(a) != canonical_norm);
                entity.add_alias(&old_name);
                entity.touch();

                match self.repo.save(&entity).await {
                    Ok(()) => report.renamed += 1,
                    Err(e) => {
                        tracing::warn!(error = %e, entity_id = %entity.id, "rename failed");
                        report.errors += 1;
                    }
                }
            }
        }

        report
    }

    /// Compute and store the embedding for one entity.
    #[tracing::instrument(name = "generate_embedding", skip(self), fields(entity_id = %entity_id))]
    pub async fn generate_embedding(
        &self,
        workspace_id: &Uuid,
        entity_id: &Uuid,
    ) -> Result<Entity, MemoryError> {
        let mut entity = load_in_workspace(&self.repo, workspace_id, entity_id).await?;
        let text = embedding_text(&entity.name, &entity.description);
        let mut vectors = self.embedder.embed_documents(&[text]).await?;
        let embedding = vectors.pop().unwrap_or_default();
        if embedding.is_empty() {
            return Err(EmbeddingError("embedder returned an empty vector".to_string()).into());
        }
        entity.embedding = embedding;
        self.repo.save(&entity).await?;
        Ok(entity)
    }

    /// Embed up to `limit` entities that have no embedding yet, `batch_size`
    /// texts per embedder call.
    #[tracing::instrument(name = "generate_embeddings_batch", skip(self), fields(workspace_id = %workspace_id))]
    pub async fn generate_embeddings_batch(
        &self,
        workspace_id: &Uuid,
        limit: usize,
        batch_size: usize,
    ) -> Result<EmbeddingBatchReport, MemoryError> {
        let mut report = EmbeddingBatchReport::default();
        let pending = self.repo.list_missing_embeddings(workspace_id, limit).await?;

        for chunk in pending.chunks(batch_size.max(1)) {
            let texts: Vec<String> = chunk
                .iter()
                .map(|e| embedding_text(&e.name, &e.description))
                .collect();

            let vectors = match self.embedder.embed_documents(&texts).await {
                Ok(v) if v.len() == chunk.len() => v,
                Ok(v) => {
                    tracing::warn!(
                        expected = chunk.len(),
                        actual = v.len(),
                        "embedder returned wrong number of vectors"
                    );
                    report.errors += chunk.len() as u32;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "embedding batch failed");
                    report.errors += chunk.len() as u32;
                    continue;
                }
            };

            for (entity, vector) in chunk.iter().zip(vectors) {
                if vector.is_empty() {
                    report.skipped += 1;
                    continue;
                }
                let mut entity = entity.clone();
                entity.embedding = vector;
                match self.repo.save(&entity).await {
                    Ok(()) => report.processed += 1,
                    Err(e) => {
                        tracing::warn!(error = %e, entity_id = %entity.id, "failed to save embedding");
                        report.errors += 1;
                    }
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            skipped = report.skipped,
            errors = report.errors,
            model = self.embedder.model_name(),
            "embedding batch complete"
        );
        Ok(report)
    }
}
