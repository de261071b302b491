use thiserror::Error;
use uuid::Uuid;

/// Errors from repository operations (used by trait definitions in mnemo-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the embedding provider.
#[derive(Debug, Error)]
#[error("embedding error: {0}")]
pub struct EmbeddingError(pub String);

/// Errors raised by memory services (resolution, merge, graph, decay, pruning).
///
/// Transient per-item failures inside batch operations are logged and counted
/// rather than surfaced through this type.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("entity {0} not found")]
    EntityNotFound(Uuid),

    #[error("conversation {0} not found")]
    ConversationNotFound(Uuid),

    #[error("entity {entity_id} belongs to workspace {actual}, not {expected}")]
    WorkspaceMismatch {
        entity_id: Uuid,
        expected: Uuid,
        actual: Uuid,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("summarization failed: {0}")]
    Summarization(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_workspace_mismatch_display() {
        let entity_id = Uuid::nil();
        let err = MemoryError::WorkspaceMismatch {
            entity_id,
            expected: Uuid::from_u128(1),
            actual: Uuid::from_u128(2),
        };
        let msg = err.to_string();
        assert!(msg.contains("00000000-0000-0000-0000-000000000001"));
        assert!(msg.contains("00000000-0000-0000-0000-000000000002"));
    }

    #[test]
    fn test_repository_error_converts_into_memory_error() {
        let err: MemoryError = RepositoryError::NotFound.into();
        assert!(matches!(err, MemoryError::Repository(RepositoryError::NotFound)));
        assert_eq!(err.to_string(), "entity not found");
    }
}
