//! Entity resolution, deduplication, and merging.
//!
//! - `resolver`: candidate search, scoring, and duplicate detection
//! - `merger`: merging duplicate records, terminology normalization, embeddings
//! - `merge_strategy`: pure merge rules shared by the merger and the graph

pub mod merge_strategy;
pub mod merger;
pub mod resolver;

pub use merger::EntityMerger;
pub use resolver::EntityResolver;

use mnemo_types::entity::Entity;
use mnemo_types::error::MemoryError;
use uuid::Uuid;

use crate::repository::entity::EntityRepository;

/// Load an entity and check that it belongs to `workspace_id`.
pub(crate) async fn load_in_workspace<R: EntityRepository>(
    repo: &R,
    workspace_id: &Uuid,
    entity_id: &Uuid,
) -> Result<Entity, MemoryError> {
    let entity = repo
        .get(entity_id)
        .await?
        .ok_or(MemoryError::EntityNotFound(*entity_id))?;
    ensure_workspace(&entity, workspace_id)?;
    Ok(entity)
}

/// Fail with `WorkspaceMismatch` if `entity` lives in another workspace.
pub(crate) fn ensure_workspace(entity: &Entity, workspace_id: &Uuid) -> Result<(), MemoryError> {
    if entity.workspace_id != *workspace_id {
        return Err(MemoryError::WorkspaceMismatch {
            entity_id: entity.id,
            expected: *workspace_id,
            actual: entity.workspace_id,
        });
    }
    Ok(())
}
