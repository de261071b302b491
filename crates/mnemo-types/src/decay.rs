//! Retention and decay reporting types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters from the conversation archival phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveReport {
    pub conversations_examined: u32,
    pub conversations_archived: u32,
    pub summaries_created: u32,
    pub messages_deleted: u64,
    pub skipped: u32,
    pub errors: u32,
}

/// Counters from the entity confidence decay phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDecayReport {
    pub entities_examined: u32,
    pub entities_decayed: u32,
    /// Touched within the grace period.
    pub exempt: u32,
    /// Change smaller than the minimum step.
    pub unchanged: u32,
    pub errors: u32,
}

/// Counters from the orphan pruning phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub orphaned_summaries_deleted: u32,
    pub entities_pruned: u32,
    pub errors: u32,
}

/// Result of one full decay pass. A phase is `None` only if it failed as a whole;
/// its error message is then recorded in `phase_errors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayReport {
    pub dry_run: bool,
    pub archive: Option<ArchiveReport>,
    pub entity_decay: Option<EntityDecayReport>,
    pub prune: Option<PruneReport>,
    pub phase_errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Point-in-time retention statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecayStats {
    pub total_entities: u64,
    pub low_confidence_entities: u64,
    pub prune_candidates: u64,
    pub average_confidence: f64,
    pub total_conversations: u64,
    pub archivable_conversations: u64,
    pub orphaned_summaries: u64,
}
