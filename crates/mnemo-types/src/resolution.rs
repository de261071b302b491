//! Entity resolution and merge result types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

use crate::entity::{Entity, EntityType};

/// Which candidate pool produced a resolution candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Normalized name or alias equals the query.
    Exact,
    /// Token pattern match, scored by combined string similarity.
    Fuzzy,
    /// An alias starts with the query.
    AliasPrefix,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKind::Exact => write!(f, "exact"),
            MatchKind::Fuzzy => write!(f, "fuzzy"),
            MatchKind::AliasPrefix => write!(f, "alias_prefix"),
        }
    }
}

/// An existing entity that may denote the same thing as a query name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionCandidate {
    pub entity: Entity,
    /// Similarity in `[0, 1]`; string-only or string+embedding blended.
    pub similarity: f32,
    pub match_kind: MatchKind,
}

/// Outcome of resolving a name against the entity store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    /// The matched existing entity, `None` when the name is new.
    pub entity: Option<Entity>,
    pub is_new: bool,
    pub confidence: f32,
    pub candidates: Vec<ResolutionCandidate>,
}

impl Resolution {
    /// A resolution that found no acceptable match.
    pub fn new_entity(confidence: f32, candidates: Vec<ResolutionCandidate>) -> Self {
        Self {
            entity: None,
            is_new: true,
            confidence,
            candidates,
        }
    }

    /// A resolution that matched an existing entity.
    pub fn matched(entity: Entity, confidence: f32, candidates: Vec<ResolutionCandidate>) -> Self {
        Self {
            entity: Some(entity),
            is_new: false,
            confidence,
            candidates,
        }
    }
}

/// Where a mention was observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionSource {
    pub source_id: String,
    pub title: String,
    /// Surrounding text snippet, if available.
    #[serde(default)]
    pub context: Option<String>,
}

/// A single extracted mention of an entity, from a document or a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMention {
    pub name: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub description: Option<String>,
    /// Document the mention came from. `None` for conversation mentions.
    #[serde(default)]
    pub source: Option<MentionSource>,
}

/// A duplicate found for a group primary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub entity_id: Uuid,
    pub name: String,
    pub similarity: f32,
}

/// A cluster of entity records believed to denote the same real-world entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub primary_id: Uuid,
    pub primary_name: String,
    pub duplicates: Vec<DuplicateMatch>,
}

impl DuplicateGroup {
    /// Lowest duplicate similarity in the group (1.0 for an empty group).
    pub fn min_similarity(&self) -> f32 {
        self.duplicates
            .iter()
            .map(|d| d.similarity)
            .fold(1.0_f32, f32::min)
    }
}

/// Counts reported by `auto_merge_duplicates`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoMergeReport {
    pub groups_merged: u32,
    /// Groups held back because at least one duplicate fell below threshold.
    pub groups_skipped: u32,
    pub entities_merged: u32,
    pub errors: u32,
}

/// Counts reported by `normalize_terminology`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub renamed: u32,
    pub already_canonical: u32,
    pub errors: u32,
}

/// Counts reported by batch embedding generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingBatchReport {
    pub processed: u32,
    pub skipped: u32,
    pub errors: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_similarity() {
        let group = DuplicateGroup {
            primary_id: Uuid::now_v7(),
            primary_name: "Acme Corp".to_string(),
            duplicates: vec![
                DuplicateMatch {
                    entity_id: Uuid::now_v7(),
                    name: "Acme Corporation".to_string(),
                    similarity: 0.97,
                },
                DuplicateMatch {
                    entity_id: Uuid::now_v7(),
                    name: "ACME".to_string(),
                    similarity: 0.85,
                },
            ],
        };
        assert!((group.min_similarity() - 0.85).abs() < f32::EPSILON);
    }

    #[test]
    fn test_match_kind_serde() {
        let json = serde_json::to_string(&MatchKind::AliasPrefix).unwrap();
        assert_eq!(json, "\"alias_prefix\"");
    }
}
