//! Summarizer port used by conversation archival.
//!
//! Implementations produce AND persist a new summary version for a
//! conversation. The decay manager only deletes messages after a summary
//! has been returned successfully.

use mnemo_types::conversation::ConversationSummary;
use mnemo_types::error::MemoryError;
use uuid::Uuid;

/// Produces a persisted summary of a conversation.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait Summarizer: Send + Sync {
    /// Summarize every message currently stored for `conversation_id` and
    /// save the result as the next summary version.
    fn summarize(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<ConversationSummary, MemoryError>> + Send;
}
