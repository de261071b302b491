mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{FailingEmbedder, conversation, entity, link, message};
use mnemo_core::context::ContextPruningEngine;
use mnemo_core::context::pruning::{format_for_prompt, to_chat_history};
use mnemo_core::decay::MemoryDecayManager;
use mnemo_core::repository::conversation::ConversationRepository;
use mnemo_core::repository::entity::EntityRepository;
use mnemo_core::summarizer::Summarizer;
use mnemo_infra::embedding::HashingEmbedder;
use mnemo_infra::memory::{InMemoryConversationRepository, InMemoryEntityRepository};
use mnemo_infra::summarizer::ExtractiveSummarizer;
use mnemo_types::config::{DecayConfig, PruningConfig};
use mnemo_types::conversation::{ConversationSummary, MessageRole, MessagesCovered};
use mnemo_types::entity::{EntityType, MIN_CONFIDENCE};
use mnemo_types::error::MemoryError;
use uuid::Uuid;

type Manager<S> = MemoryDecayManager<InMemoryEntityRepository, InMemoryConversationRepository, S>;

fn manager(
    entities: &InMemoryEntityRepository,
    conversations: &InMemoryConversationRepository,
) -> Manager<ExtractiveSummarizer<InMemoryConversationRepository>> {
    MemoryDecayManager::new(
        entities.clone(),
        conversations.clone(),
        Arc::new(ExtractiveSummarizer::new(conversations.clone())),
        DecayConfig::default(),
    )
}

/// Created 100 days ago: 8 messages from ~95 days ago, 4 from ~10 days ago.
async fn old_conversation(conversations: &InMemoryConversationRepository) -> Uuid {
    let now = Utc::now();
    let conv = conversation(Uuid::now_v7(), now - Duration::days(100));
    conversations.save_conversation(&conv).await.unwrap();
    for i in 0..8 {
        let at = now - Duration::days(95) + Duration::minutes(i);
        let text = format!("We should plan the database migration step {i}.");
        conversations
            .save_message(&message(conv.id, MessageRole::User, &text, at))
            .await
            .unwrap();
    }
    for i in 0..4 {
        let at = now - Duration::days(10) + Duration::minutes(i);
        let text = format!("Follow-up on the database migration, item {i}.");
        conversations
            .save_message(&message(conv.id, MessageRole::Assistant, &text, at))
            .await
            .unwrap();
    }
    conv.id
}

struct BrokenSummarizer;

impl Summarizer for BrokenSummarizer {
    async fn summarize(&self, _conversation_id: &Uuid) -> Result<ConversationSummary, MemoryError> {
        Err(MemoryError::Summarization("provider unavailable".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Decay manager
// ---------------------------------------------------------------------------

#[tokio::test]
async fn archive_summarizes_then_deletes_only_expired_messages() {
    let entities = InMemoryEntityRepository::new();
    let conversations = InMemoryConversationRepository::new();
    let conv_id = old_conversation(&conversations).await;

    let report = manager(&entities, &conversations)
        .archive_old_conversations(false)
        .await
        .unwrap();

    assert_eq!(report.conversations_examined, 1);
    assert_eq!(report.summaries_created, 1);
    assert_eq!(report.conversations_archived, 1);
    assert_eq!(report.messages_deleted, 8);
    assert_eq!(report.errors, 0);

    let summaries = conversations.list_summaries().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(
        summaries[0].messages_covered,
        MessagesCovered {
            start: 0,
            end: 11,
            total: 12
        }
    );

    let conv = conversations.get_conversation(&conv_id).await.unwrap().unwrap();
    assert_eq!(conv.summary_id, Some(summaries[0].id));

    let left = conversations.messages(&conv_id).await.unwrap();
    assert_eq!(left.len(), 4);
    assert!(left.iter().all(|m| m.role == MessageRole::Assistant));
}

#[tokio::test]
async fn archive_dry_run_writes_nothing() {
    let entities = InMemoryEntityRepository::new();
    let conversations = InMemoryConversationRepository::new();
    let conv_id = old_conversation(&conversations).await;

    let report = manager(&entities, &conversations)
        .archive_old_conversations(true)
        .await
        .unwrap();

    assert_eq!(report.summaries_created, 1);
    assert_eq!(report.messages_deleted, 0);
    assert!(conversations.list_summaries().await.unwrap().is_empty());
    assert_eq!(conversations.count_messages(&conv_id).await.unwrap(), 12);
}

#[tokio::test]
async fn failed_summary_keeps_every_message() {
    let entities = InMemoryEntityRepository::new();
    let conversations = InMemoryConversationRepository::new();
    let conv_id = old_conversation(&conversations).await;

    let manager = MemoryDecayManager::new(
        entities.clone(),
        conversations.clone(),
        Arc::new(BrokenSummarizer),
        DecayConfig::default(),
    );
    let report = manager.archive_old_conversations(false).await.unwrap();

    assert_eq!(report.errors, 1);
    assert_eq!(report.messages_deleted, 0);
    assert_eq!(conversations.count_messages(&conv_id).await.unwrap(), 12);
}

#[tokio::test]
async fn entity_decay_respects_grace_period_and_floor() {
    let entities = InMemoryEntityRepository::new();
    let conversations = InMemoryConversationRepository::new();
    let ws = Uuid::now_v7();
    let now = Utc::now();

    let mut fresh = entity(ws, "Fresh", EntityType::Concept, 3);
    fresh.updated_at = now - Duration::days(3);
    let mut month_old = entity(ws, "Month Old", EntityType::Concept, 3);
    month_old.updated_at = now - Duration::days(30);
    let mut ancient = entity(ws, "Ancient", EntityType::Concept, 3);
    ancient.updated_at = now - Duration::days(400);
    for e in [&fresh, &month_old, &ancient] {
        entities.save(e).await.unwrap();
    }

    let manager = manager(&entities, &conversations);
    let report = manager.apply_entity_decay(false).await.unwrap();
    assert_eq!(report.entities_examined, 2);
    assert_eq!(report.entities_decayed, 2);

    let fresh = entities.get(&fresh.id).await.unwrap().unwrap();
    assert_eq!(fresh.confidence, 1.0);

    let month_old = entities.get(&month_old.id).await.unwrap().unwrap();
    let expected = 0.99_f64.powi(30) as f32;
    assert!((month_old.confidence - expected).abs() < 1e-3);
    assert!(month_old.updated_at < now - Duration::days(29));

    let ancient = entities.get(&ancient.id).await.unwrap().unwrap();
    assert_eq!(ancient.confidence, MIN_CONFIDENCE);

    // nothing new to decay on an immediate second pass
    let again = manager.apply_entity_decay(false).await.unwrap();
    assert_eq!(again.entities_decayed, 0);
    assert_eq!(again.unchanged, 2);
}

#[tokio::test]
async fn prune_removes_orphans_and_weak_entities() {
    let entities = InMemoryEntityRepository::new();
    let conversations = InMemoryConversationRepository::new();
    let ws = Uuid::now_v7();

    let mut weak = entity(ws, "Typo Entity", EntityType::Other, 1);
    weak.confidence = 0.2;
    let mut linked = entity(ws, "Linked", EntityType::Concept, 1);
    linked.confidence = 0.2;
    let anchor = entity(ws, "Anchor", EntityType::Concept, 10);
    link(&mut linked, &anchor, "related_to", 0.5);
    for e in [&weak, &linked, &anchor] {
        entities.save(e).await.unwrap();
    }

    let live = conversation(ws, Utc::now());
    let doomed = conversation(ws, Utc::now());
    conversations.save_conversation(&live).await.unwrap();
    conversations.save_conversation(&doomed).await.unwrap();
    for conv_id in [live.id, doomed.id] {
        conversations
            .save_summary(&ConversationSummary {
                id: Uuid::now_v7(),
                conversation_id: conv_id,
                summary: "short".to_string(),
                topics: vec![],
                key_insights: vec![],
                messages_covered: MessagesCovered::default(),
                version: 1,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
    }
    conversations.delete_conversation(&doomed.id);

    let manager = manager(&entities, &conversations);
    let stats = manager.get_decay_stats().await.unwrap();
    assert_eq!(stats.total_entities, 3);
    assert_eq!(stats.prune_candidates, 1);
    assert_eq!(stats.orphaned_summaries, 1);

    let report = manager.prune_orphaned_data(false).await.unwrap();
    assert_eq!(report.orphaned_summaries_deleted, 1);
    assert_eq!(report.entities_pruned, 1);

    assert!(entities.get(&weak.id).await.unwrap().is_none());
    assert!(entities.get(&linked.id).await.unwrap().is_some());
    let remaining = conversations.list_summaries().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].conversation_id, live.id);
}

#[tokio::test]
async fn full_pass_reports_every_phase() {
    let entities = InMemoryEntityRepository::new();
    let conversations = InMemoryConversationRepository::new();
    old_conversation(&conversations).await;

    let report = manager(&entities, &conversations).run_decay_process(false).await;

    assert!(report.phase_errors.is_empty());
    assert_eq!(report.archive.unwrap().summaries_created, 1);
    assert!(report.entity_decay.is_some());
    assert!(report.prune.is_some());
    assert!(report.completed_at >= report.started_at);
}

// ---------------------------------------------------------------------------
// Context pruning
// ---------------------------------------------------------------------------

/// A message of exactly 200 ASCII chars, i.e. 50 estimated tokens.
fn fifty_token_text(i: usize) -> String {
    let mut text = format!("message {i:02} ");
    while text.len() < 200 {
        text.push_str("filler ");
    }
    text.truncate(200);
    text
}

async fn ten_message_conversation(conversations: &InMemoryConversationRepository) -> Uuid {
    let now = Utc::now();
    let conv = conversation(Uuid::now_v7(), now - Duration::hours(1));
    conversations.save_conversation(&conv).await.unwrap();
    for i in 0..10 {
        let at = now - Duration::minutes(20 - i as i64);
        conversations
            .save_message(&message(conv.id, MessageRole::User, &fifty_token_text(i), at))
            .await
            .unwrap();
    }
    conv.id
}

#[tokio::test]
async fn pruned_context_never_exceeds_token_limit() {
    let conversations = InMemoryConversationRepository::new();
    let conv_id = ten_message_conversation(&conversations).await;
    let engine = ContextPruningEngine::new(
        conversations.clone(),
        Arc::new(HashingEmbedder::default()),
        PruningConfig::default(),
    );

    let context = engine
        .prune_to_token_limit(&conv_id, "what did we decide about filler messages?", 100)
        .await
        .unwrap();

    assert!(context.total_tokens <= 100);
    assert!(context.stats.effective_budget <= 100);
    assert_eq!(context.stats.candidates_scanned, 10);
    assert_eq!(
        context.stats.pruned_count,
        10 - context.stats.episodic_count - context.stats.semantic_count
    );
}

#[tokio::test]
async fn recent_messages_stay_episodic_without_relevance() {
    let conversations = InMemoryConversationRepository::new();
    let conv_id = ten_message_conversation(&conversations).await;
    let engine = ContextPruningEngine::new(
        conversations.clone(),
        Arc::new(FailingEmbedder),
        PruningConfig::default(),
    );

    let context = engine
        .prune_to_token_limit(&conv_id, "database", 1000)
        .await
        .unwrap();

    assert_eq!(context.episodic.len(), 5);
    assert!(context.semantic.is_empty());
    assert_eq!(context.total_tokens, 250);
    assert_eq!(context.stats.pruned_count, 5);
    assert!(context.episodic.iter().all(|m| m.relevance == 0.0));
    // chronological
    assert!(
        context
            .episodic
            .windows(2)
            .all(|w| w[0].message.created_at <= w[1].message.created_at)
    );
    assert!(context.episodic[4].message.content.starts_with("message 09"));
}

#[tokio::test]
async fn relevant_old_message_becomes_semantic() {
    let conversations = InMemoryConversationRepository::new();
    let conv_id = ten_message_conversation(&conversations).await;
    let target = message(
        conv_id,
        MessageRole::User,
        "postgres migration plan",
        Utc::now() - Duration::minutes(30),
    );
    conversations.save_message(&target).await.unwrap();

    let engine = ContextPruningEngine::new(
        conversations.clone(),
        Arc::new(HashingEmbedder::default()),
        PruningConfig::default(),
    );
    let context = engine
        .prune_to_token_limit(&conv_id, "postgres migration plan", 1000)
        .await
        .unwrap();

    assert_eq!(context.episodic.len(), 5);
    assert_eq!(context.semantic[0].message.id, target.id);
    assert!(context.semantic[0].relevance > 0.99);

    let history = to_chat_history(&context);
    assert_eq!(history[0].content, "postgres migration plan");
    assert!(format_for_prompt(&context).contains("## Relevant earlier messages"));
}

#[tokio::test]
async fn summary_included_whole_or_not_at_all() {
    let conversations = InMemoryConversationRepository::new();
    let conv_id = ten_message_conversation(&conversations).await;
    let engine = ContextPruningEngine::new(
        conversations.clone(),
        Arc::new(FailingEmbedder),
        PruningConfig::default(),
    );

    let summary = |text: String, version: u32| ConversationSummary {
        id: Uuid::now_v7(),
        conversation_id: conv_id,
        summary: text,
        topics: vec![],
        key_insights: vec![],
        messages_covered: MessagesCovered::default(),
        version,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    conversations
        .save_summary(&summary("Discussed fillers.".to_string(), 1))
        .await
        .unwrap();
    let small = engine.prune_to_token_limit(&conv_id, "", 1000).await.unwrap();
    assert!(small.summary.is_some());
    assert_eq!(small.stats.summary_tokens, 5);

    conversations
        .save_summary(&summary("x".repeat(2000), 2))
        .await
        .unwrap();
    let large = engine.prune_to_token_limit(&conv_id, "", 1000).await.unwrap();
    assert!(large.summary.is_none());
    assert_eq!(large.stats.summary_tokens, 0);
    assert!(large.total_tokens <= 1000);
}

#[tokio::test]
async fn unknown_conversation_is_an_error() {
    let engine = ContextPruningEngine::new(
        InMemoryConversationRepository::new(),
        Arc::new(HashingEmbedder::default()),
        PruningConfig::default(),
    );
    assert!(matches!(
        engine.build_pruned_context(&Uuid::now_v7(), "anything").await,
        Err(MemoryError::ConversationNotFound(_))
    ));
}
