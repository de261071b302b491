//! EntityRepository trait definition.
//!
//! CRUD plus the predicate queries the resolver, merger, graph, and decay
//! services need. All name predicates compare against normalized names
//! (see `mnemo_types::entity::normalize_name`).

use chrono::{DateTime, Utc};
use mnemo_types::entity::{Entity, EntityType};
use mnemo_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for entity persistence.
///
/// Implementations live in mnemo-infra (e.g., `SqliteEntityRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait EntityRepository: Send + Sync {
    /// Get an entity by id.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Entity>, RepositoryError>> + Send;

    /// Get several entities by id. Ids that do not resolve are omitted.
    fn get_many(
        &self,
        ids: &[Uuid],
    ) -> impl std::future::Future<Output = Result<Vec<Entity>, RepositoryError>> + Send;

    /// Insert or replace an entity.
    fn save(
        &self,
        entity: &Entity,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete entities by id. Returns the number actually deleted.
    fn delete_many(
        &self,
        ids: &[Uuid],
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Entities whose normalized name, or any normalized alias, equals `normalized_name`.
    fn find_exact(
        &self,
        workspace_id: &Uuid,
        normalized_name: &str,
        entity_type: Option<EntityType>,
    ) -> impl std::future::Future<Output = Result<Vec<Entity>, RepositoryError>> + Send;

    /// Entities whose normalized name contains all `tokens` in order
    /// (the `tok1.*tok2.*...` pattern).
    fn find_by_name_pattern(
        &self,
        workspace_id: &Uuid,
        tokens: &[String],
        entity_type: Option<EntityType>,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Entity>, RepositoryError>> + Send;

    /// Entities with at least one alias whose normalized form starts with `prefix`.
    fn find_by_alias_prefix(
        &self,
        workspace_id: &Uuid,
        prefix: &str,
        entity_type: Option<EntityType>,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Entity>, RepositoryError>> + Send;

    /// Entities of a workspace ordered by total mentions DESC.
    fn list_by_mentions(
        &self,
        workspace_id: &Uuid,
        limit: Option<usize>,
    ) -> impl std::future::Future<Output = Result<Vec<Entity>, RepositoryError>> + Send;

    /// Entities of a workspace with an empty embedding.
    fn list_missing_embeddings(
        &self,
        workspace_id: &Uuid,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Entity>, RepositoryError>> + Send;

    /// Entities (any workspace) not touched since `updated_before`.
    fn list_stale(
        &self,
        updated_before: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Entity>, RepositoryError>> + Send;

    /// Entities (any workspace) with `total_mentions < max_mentions`, no
    /// relationships, and `confidence < max_confidence`.
    fn list_prune_candidates(
        &self,
        max_mentions: u32,
        max_confidence: f32,
    ) -> impl std::future::Future<Output = Result<Vec<Entity>, RepositoryError>> + Send;

    /// Set confidence and `last_decayed_at` without touching `updated_at`.
    fn update_confidence(
        &self,
        id: &Uuid,
        confidence: f32,
        decayed_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Bulk-rewrite every relationship in the workspace targeting one of
    /// `from_ids` so it targets `to_id` instead.
    ///
    /// Relationships that would become self-loops are dropped, and a
    /// resulting duplicate `(target, type)` pair keeps the stronger edge.
    /// Returns the number of entities rewritten.
    fn repoint_relationships(
        &self,
        workspace_id: &Uuid,
        from_ids: &[Uuid],
        to_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Count entities, optionally restricted to one workspace.
    fn count(
        &self,
        workspace_id: Option<&Uuid>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Count entities (any workspace) with confidence below `threshold`.
    fn count_below_confidence(
        &self,
        threshold: f32,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Mean confidence across all entities (0.0 when empty).
    fn average_confidence(
        &self,
    ) -> impl std::future::Future<Output = Result<f64, RepositoryError>> + Send;
}
