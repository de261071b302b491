//! Extractive conversation summarizer.
//!
//! Builds a summary from the conversation's own sentences: the most
//! frequent content words become topics, sentences are ranked by how many
//! topic words they contain, and sentences stating a decision or plan are
//! kept as key insights. No model calls; the same messages always produce
//! the same summary text.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use mnemo_core::repository::conversation::ConversationRepository;
use mnemo_core::summarizer::Summarizer;
use mnemo_types::conversation::{ConversationMessage, ConversationSummary, MessagesCovered};
use mnemo_types::error::MemoryError;
use uuid::Uuid;

const MAX_TOPICS: usize = 5;
const MAX_SUMMARY_SENTENCES: usize = 3;
const MAX_INSIGHTS: usize = 3;
const MAX_SENTENCE_CHARS: usize = 240;

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "also", "because", "been", "before", "being", "could", "does",
    "doing", "from", "have", "having", "here", "into", "just", "like", "more", "most", "much",
    "only", "other", "over", "same", "should", "some", "such", "than", "that", "their", "them",
    "then", "there", "these", "they", "this", "those", "through", "very", "want", "were", "what",
    "when", "where", "which", "while", "will", "with", "would", "your", "yours",
];

const INSIGHT_MARKERS: &[&str] = &[
    "decided", "agreed", "conclusion", "plan", "next step", "important", "must", "should",
];

/// Summarizer that persists extractive summaries through a conversation
/// repository.
pub struct ExtractiveSummarizer<C: ConversationRepository> {
    conversations: C,
}

impl<C: ConversationRepository> ExtractiveSummarizer<C> {
    pub fn new(conversations: C) -> Self {
        Self { conversations }
    }
}

impl<C: ConversationRepository> Summarizer for ExtractiveSummarizer<C> {
    #[tracing::instrument(name = "summarize_conversation", skip(self), fields(conversation_id = %conversation_id))]
    async fn summarize(&self, conversation_id: &Uuid) -> Result<ConversationSummary, MemoryError> {
        if self
            .conversations
            .get_conversation(conversation_id)
            .await?
            .is_none()
        {
            return Err(MemoryError::ConversationNotFound(*conversation_id));
        }

        let messages = self.conversations.messages(conversation_id).await?;
        if messages.is_empty() {
            return Err(MemoryError::Summarization(
                "conversation has no messages".to_string(),
            ));
        }

        let version = self
            .conversations
            .get_latest_summary(conversation_id)
            .await?
            .map(|s| s.version + 1)
            .unwrap_or(1);

        let topics = extract_topics(&messages);
        let sentences = split_sentences(&messages);
        let summary_text = build_summary_text(&messages, &sentences, &topics);
        let key_insights = extract_insights(&sentences);

        let total = messages.len() as u32;
        let now = Utc::now();
        let summary = ConversationSummary {
            id: Uuid::now_v7(),
            conversation_id: *conversation_id,
            summary: summary_text,
            topics,
            key_insights,
            messages_covered: MessagesCovered {
                start: 0,
                end: total - 1,
                total,
            },
            version,
            created_at: now,
            updated_at: now,
        };

        self.conversations.save_summary(&summary).await?;
        tracing::info!(version, messages = total, "conversation summarized");
        Ok(summary)
    }
}

fn content_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
}

/// Most frequent content words, ties broken alphabetically.
fn extract_topics(messages: &[ConversationMessage]) -> Vec<String> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for message in messages {
        for word in content_words(&message.content) {
            *counts.entry(word).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(String, u32)> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(MAX_TOPICS).map(|(w, _)| w).collect()
}

fn split_sentences(messages: &[ConversationMessage]) -> Vec<String> {
    let mut sentences = Vec::new();
    for message in messages {
        for raw in message.content.split(['.', '!', '?', '\n']) {
            let sentence = raw.trim();
            if sentence.split_whitespace().count() < 3 {
                continue;
            }
            sentences.push(truncate_chars(sentence, MAX_SENTENCE_CHARS));
        }
    }
    sentences
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

fn build_summary_text(
    messages: &[ConversationMessage],
    sentences: &[String],
    topics: &[String],
) -> String {
    let topic_set: HashSet<&str> = topics.iter().map(String::as_str).collect();

    let mut scored: Vec<(usize, usize)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let hits = content_words(s)
                .filter(|w| topic_set.contains(w.as_str()))
                .count();
            (i, hits)
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut chosen: Vec<usize> = scored
        .into_iter()
        .take(MAX_SUMMARY_SENTENCES)
        .map(|(i, _)| i)
        .collect();
    chosen.sort_unstable();

    let mut text = match (messages.first(), messages.last()) {
        (Some(first), Some(last)) => format!(
            "{} messages from {} to {}.",
            messages.len(),
            first.created_at.format("%Y-%m-%d"),
            last.created_at.format("%Y-%m-%d"),
        ),
        _ => String::new(),
    };
    if !topics.is_empty() {
        text.push_str(&format!(" Topics: {}.", topics.join(", ")));
    }
    for i in chosen {
        text.push(' ');
        text.push_str(&sentences[i]);
        text.push('.');
    }
    text
}

fn extract_insights(sentences: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    sentences
        .iter()
        .filter(|s| {
            let lower = s.to_lowercase();
            INSIGHT_MARKERS.iter().any(|m| lower.contains(m))
        })
        .filter(|s| seen.insert(s.to_lowercase()))
        .take(MAX_INSIGHTS)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryConversationRepository;
    use chrono::Duration;
    use mnemo_types::conversation::{Conversation, MessageRole};

    fn msg(conversation_id: Uuid, content: &str, minutes_ago: i64) -> ConversationMessage {
        ConversationMessage {
            id: Uuid::now_v7(),
            conversation_id,
            role: MessageRole::User,
            content: content.to_string(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    async fn seeded() -> (InMemoryConversationRepository, Uuid) {
        let repo = InMemoryConversationRepository::new();
        let conv = Conversation {
            id: Uuid::now_v7(),
            workspace_id: Uuid::now_v7(),
            title: None,
            created_at: Utc::now() - Duration::hours(2),
            updated_at: Utc::now(),
            summary_id: None,
        };
        repo.save_conversation(&conv).await.unwrap();
        for (i, text) in [
            "We need to migrate the billing database to postgres.",
            "The billing database has grown too large for sqlite.",
            "We decided to run the postgres migration next week.",
            "Remember to back up the billing tables first.",
        ]
        .iter()
        .enumerate()
        {
            repo.save_message(&msg(conv.id, text, 60 - i as i64)).await.unwrap();
        }
        (repo, conv.id)
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[tokio::test]
    async fn test_summarize_persists_next_version() {
        let (repo, conv_id) = seeded().await;
        let summarizer = ExtractiveSummarizer::new(repo.clone());

        let first = summarizer.summarize(&conv_id).await.unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(
            first.messages_covered,
            MessagesCovered {
                start: 0,
                end: 3,
                total: 4
            }
        );
        assert!(first.topics.contains(&"billing".to_string()));
        assert!(first.summary.starts_with("4 messages"));
        assert_eq!(first.key_insights.len(), 1);

        let second = summarizer.summarize(&conv_id).await.unwrap();
        assert_eq!(second.version, 2);
        let latest = repo.get_latest_summary(&conv_id).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[tokio::test]
    async fn test_summarize_unknown_conversation() {
        let summarizer = ExtractiveSummarizer::new(InMemoryConversationRepository::new());
        let result = summarizer.summarize(&Uuid::now_v7()).await;
        assert!(matches!(result, Err(MemoryError::ConversationNotFound(_))));
    }
}
