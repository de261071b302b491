//! MemoryDecayManager: one retention pass over conversations and entities.
//!
//! Phases run in order: archive -> entity decay -> prune. A phase that fails
//! as a whole is recorded and the next phase still runs. Inside a phase,
//! per-item failures are logged and counted.

use std::sync::Arc;

use chrono::{Duration, Utc};
use mnemo_types::config::DecayConfig;
use mnemo_types::decay::{ArchiveReport, DecayReport, DecayStats, EntityDecayReport, PruneReport};
use mnemo_types::error::MemoryError;

use super::policy::{DecayDecision, decide_decay, is_prunable};
use crate::repository::conversation::ConversationRepository;
use crate::repository::entity::EntityRepository;
use crate::summarizer::Summarizer;

/// Runs retention passes. All mutations are keyed by id, so an interrupted
/// pass leaves the remaining items for the next run.
pub struct MemoryDecayManager<R: EntityRepository, C: ConversationRepository, S: Summarizer> {
    entities: R,
    conversations: C,
    summarizer: Arc<S>,
    config: DecayConfig,
}

impl<R, C, S> MemoryDecayManager<R, C, S>
where
    R: EntityRepository,
    C: ConversationRepository,
    S: Summarizer,
{
    pub fn new(entities: R, conversations: C, summarizer: Arc<S>, config: DecayConfig) -> Self {
        Self {
            entities,
            conversations,
            summarizer,
            config,
        }
    }

    pub fn config(&self) -> &DecayConfig {
        &self.config
    }

    /// Run all three phases. With `dry_run`, nothing is written and the
    /// counters describe what a real pass would do.
    #[tracing::instrument(name = "run_decay_process", skip(self))]
    pub async fn run_decay_process(&self, dry_run: bool) -> DecayReport {
        let started_at = Utc::now();
        let mut phase_errors = Vec::new();

        let archive = match self.archive_old_conversations(dry_run).await {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::error!(error = %e, "archive phase failed");
                phase_errors.push(format!("archive: {e}"));
                None
            }
        };

        let entity_decay = match self.apply_entity_decay(dry_run).await {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::error!(error = %e, "entity decay phase failed");
                phase_errors.push(format!("entity_decay: {e}"));
                None
            }
        };

        let prune = match self.prune_orphaned_data(dry_run).await {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::error!(error = %e, "prune phase failed");
                phase_errors.push(format!("prune: {e}"));
                None
            }
        };

        DecayReport {
            dry_run,
            archive,
            entity_decay,
            prune,
            phase_errors,
            started_at,
            completed_at: Utc::now(),
        }
    }

    /// Summarize and trim conversations older than `max_age_days`.
    ///
    /// A conversation without a summary is summarized first; its messages
    /// are only deleted once that summary exists. Messages newer than
    /// `message_retention_days` are kept.
    #[tracing::instrument(name = "archive_old_conversations", skip(self))]
    pub async fn archive_old_conversations(
        &self,
        dry_run: bool,
    ) -> Result<ArchiveReport, MemoryError> {
        let now = Utc::now();
        let cutoff = now - Duration::days(self.config.max_age_days);
        let retention_cutoff = now - Duration::days(self.config.message_retention_days);

        let conversations = self
            .conversations
            .list_conversations_started_before(cutoff, self.config.min_messages_for_summary)
            .await?;

        let mut report = ArchiveReport::default();
        for conversation in &conversations {
            report.conversations_examined += 1;

            let existing = match self.conversations.get_latest_summary(&conversation.id).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, conversation_id = %conversation.id, "summary lookup failed");
                    report.errors += 1;
                    continue;
                }
            };

            if dry_run {
                if existing.is_none() {
                    report.summaries_created += 1;
                }
                report.conversations_archived += 1;
                continue;
            }

            let mut summarized = false;
            if existing.is_none() {
                let summary = match self.summarizer.summarize(&conversation.id).await {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            conversation_id = %conversation.id,
                            "summarization failed, keeping messages"
                        );
                        report.errors += 1;
                        continue;
                    }
                };
                report.summaries_created += 1;
                summarized = true;

                if let Err(e) = self
                    .conversations
                    .set_summary_pointer(&conversation.id, &summary.id)
                    .await
                {
                    tracing::warn!(error = %e, conversation_id = %conversation.id, "failed to store summary pointer");
                    report.errors += 1;
                }
            }

            match self
                .conversations
                .delete_messages_before(&conversation.id, retention_cutoff)
                .await
            {
                Ok(deleted) => {
                    report.messages_deleted += deleted;
                    if deleted > 0 || summarized {
                        report.conversations_archived += 1;
                    } else {
                        report.skipped += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, conversation_id = %conversation.id, "message deletion failed");
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            examined = report.conversations_examined,
            archived = report.conversations_archived,
            summaries = report.summaries_created,
            messages_deleted = report.messages_deleted,
            "archive phase complete"
        );
        Ok(report)
    }

    /// Exponentially decay the confidence of entities untouched for longer
    /// than the grace period. Never goes below `MIN_CONFIDENCE`.
    #[tracing::instrument(name = "apply_entity_decay", skip(self))]
    pub async fn apply_entity_decay(&self, dry_run: bool) -> Result<EntityDecayReport, MemoryError> {
        let now = Utc::now();
        let stale_before = now - Duration::days(self.config.grace_period_days);
        let candidates = self.entities.list_stale(stale_before).await?;

        let mut report = EntityDecayReport::default();
        for entity in &candidates {
            report.entities_examined += 1;
            match decide_decay(entity, now, &self.config) {
                DecayDecision::Exempt => report.exempt += 1,
                DecayDecision::Unchanged => report.unchanged += 1,
                DecayDecision::Decay(confidence) => {
                    if dry_run {
                        report.entities_decayed += 1;
                        continue;
                    }
                    match self.entities.update_confidence(&entity.id, confidence, now).await {
                        Ok(()) => report.entities_decayed += 1,
                        Err(e) => {
                            tracing::warn!(error = %e, entity_id = %entity.id, "confidence update failed");
                            report.errors += 1;
                        }
                    }
                }
            }
        }

        tracing::info!(
            examined = report.entities_examined,
            decayed = report.entities_decayed,
            unchanged = report.unchanged,
            "entity decay phase complete"
        );
        Ok(report)
    }

    /// Delete summaries of vanished conversations and low-value entities.
    #[tracing::instrument(name = "prune_orphaned_data", skip(self))]
    pub async fn prune_orphaned_data(&self, dry_run: bool) -> Result<PruneReport, MemoryError> {
        let mut report = PruneReport::default();

        let summaries = self.conversations.list_summaries().await?;
        for summary in &summaries {
            match self.conversations.get_conversation(&summary.conversation_id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    if dry_run {
                        report.orphaned_summaries_deleted += 1;
                        continue;
                    }
                    match self.conversations.delete_summary(&summary.id).await {
                        Ok(()) => report.orphaned_summaries_deleted += 1,
                        Err(e) => {
                            tracing::warn!(error = %e, summary_id = %summary.id, "summary deletion failed");
                            report.errors += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, summary_id = %summary.id, "conversation lookup failed");
                    report.errors += 1;
                }
            }
        }

        let candidates = self
            .entities
            .list_prune_candidates(self.config.prune_max_mentions, self.config.prune_max_confidence)
            .await?;
        let ids: Vec<_> = candidates
            .iter()
            .filter(|e| is_prunable(e, &self.config))
            .map(|e| e.id)
            .collect();

        if dry_run {
            report.entities_pruned = ids.len() as u32;
        } else if !ids.is_empty() {
            match self.entities.delete_many(&ids).await {
                Ok(deleted) => report.entities_pruned = deleted as u32,
                Err(e) => {
                    tracing::warn!(error = %e, count = ids.len(), "entity pruning failed");
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            orphaned_summaries = report.orphaned_summaries_deleted,
            entities_pruned = report.entities_pruned,
            "prune phase complete"
        );
        Ok(report)
    }

    /// Point-in-time retention statistics. Read-only.
    #[tracing::instrument(name = "get_decay_stats", skip(self))]
    pub async fn get_decay_stats(&self) -> Result<DecayStats, MemoryError> {
        let cutoff = Utc::now() - Duration::days(self.config.max_age_days);

        let total_entities = self.entities.count(None).await?;
        let low_confidence_entities = self
            .entities
            .count_below_confidence(self.config.prune_max_confidence)
            .await?;
        let prune_candidates = self
            .entities
            .list_prune_candidates(self.config.prune_max_mentions, self.config.prune_max_confidence)
            .await?
            .len() as u64;
        let average_confidence = self.entities.average_confidence().await?;

        let total_conversations = self.conversations.count_conversations().await?;
        let archivable_conversations = self
            .conversations
            .list_conversations_started_before(cutoff, self.config.min_messages_for_summary)
            .await?
            .len() as u64;

        let mut orphaned_summaries = 0;
        for summary in self.conversations.list_summaries().await? {
            if self
                .conversations
                .get_conversation(&summary.conversation_id)
                .await?
                .is_none()
            {
                orphaned_summaries += 1;
            }
        }

        Ok(DecayStats {
            total_entities,
            low_confidence_entities,
            prune_candidates,
            average_confidence,
            total_conversations,
            archivable_conversations,
            orphaned_summaries,
        })
    }
}
