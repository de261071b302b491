//! Entity types for the knowledge graph.
//!
//! An `Entity` is a named real-world concept tracked across documents and
//! conversations. Entities are workspace-scoped and reference each other
//! only through stable ids, so merges and deletions can never leave a
//! dangling in-memory pointer -- at worst a relationship targets an id that
//! no longer resolves, which readers treat as "edge removed".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Lower bound for entity confidence. Decay never drives confidence below it.
pub const MIN_CONFIDENCE: f32 = 0.1;

/// Maximum number of recent contexts kept per document source.
pub const MAX_SOURCE_CONTEXTS: usize = 5;

/// Kind of real-world thing an entity denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Person,
    Organization,
    Concept,
    Technology,
    Product,
    Location,
    Date,
    Event,
    Other,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Person => write!(f, "person"),
            EntityType::Organization => write!(f, "organization"),
            EntityType::Concept => write!(f, "concept"),
            EntityType::Technology => write!(f, "technology"),
            EntityType::Product => write!(f, "product"),
            EntityType::Location => write!(f, "location"),
            EntityType::Date => write!(f, "date"),
            EntityType::Event => write!(f, "event"),
            EntityType::Other => write!(f, "other"),
        }
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "person" => Ok(EntityType::Person),
            "organization" => Ok(EntityType::Organization),
            "concept" => Ok(EntityType::Concept),
            "technology" => Ok(EntityType::Technology),
            "product" => Ok(EntityType::Product),
            "location" => Ok(EntityType::Location),
            "date" => Ok(EntityType::Date),
            "event" => Ok(EntityType::Event),
            "other" => Ok(EntityType::Other),
            other => Err(format!("invalid entity type: '{other}'")),
        }
    }
}

/// A document in which an entity was mentioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSource {
    pub source_id: String,
    pub title: String,
    pub mention_count: u32,
    /// Recent surrounding text snippets, oldest first, capped at
    /// [`MAX_SOURCE_CONTEXTS`].
    #[serde(default)]
    pub contexts: Vec<String>,
}

/// A directed, labeled edge from one entity to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub target_entity_id: Uuid,
    pub relationship_type: String,
    /// Strength in `[0, 1]`.
    pub strength: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

/// Aggregate mention statistics for an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStats {
    pub total_mentions: u32,
    /// Always derived from the source list, never summed across merges.
    pub document_count: u32,
    pub conversation_mentions: u32,
}

/// A tracked entity in a workspace's knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    /// `normalize_name(name)`. Use [`Entity::rename`] to keep the two in sync.
    pub normalized_name: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Possibly empty when no embedding has been generated yet.
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub sources: Vec<DocumentSource>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub stats: EntityStats,
    /// Ongoing relevance in `[MIN_CONFIDENCE, 1.0]`.
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Last time confidence decay was applied. Not a "touch": decay does not
    /// move `updated_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_decayed_at: Option<DateTime<Utc>>,
}

/// Lowercase, trim, and collapse internal whitespace.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Clamp a confidence value into `[MIN_CONFIDENCE, 1.0]`.
pub fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        return MIN_CONFIDENCE;
    }
    confidence.clamp(MIN_CONFIDENCE, 1.0)
}

impl Entity {
    /// Create a fresh entity with full confidence and no mentions.
    pub fn new(workspace_id: Uuid, name: &str, entity_type: EntityType) -> Self {
        let now = Utc::now();
        let name = name.trim().to_string();
        Self {
            id: Uuid::now_v7(),
            workspace_id,
            normalized_name: normalize_name(&name),
            name,
            entity_type,
            description: String::new(),
            aliases: Vec::new(),
            embedding: Vec::new(),
            sources: Vec::new(),
            relationships: Vec::new(),
            stats: EntityStats::default(),
            confidence: 1.0,
            created_at: now,
            updated_at: now,
            last_decayed_at: None,
        }
    }

    /// Change the display name, recomputing the normalized name.
    pub fn rename(&mut self, name: &str) {
        self.name = name.trim().to_string();
        self.normalized_name = normalize_name(&self.name);
    }

    /// Whether `term` (compared normalized) is one of this entity's aliases.
    pub fn has_alias(&self, term: &str) -> bool {
        let term = normalize_name(term);
        self.aliases.iter().any(|a| normalize_name(a) == term)
    }

    /// Add an alias unless it duplicates the name or an existing alias.
    ///
    /// Returns `true` if the alias set changed.
    pub fn add_alias(&mut self, alias: &str) -> bool {
        let alias = alias.trim();
        let normalized = normalize_name(alias);
        if normalized.is_empty() || normalized == self.normalized_name || self.has_alias(alias) {
            return false;
        }
        self.aliases.push(alias.to_string());
        true
    }

    /// Recompute `stats.document_count` from the source list.
    pub fn recompute_document_count(&mut self) {
        self.stats.document_count = self.sources.len() as u32;
    }

    /// Find the relationship to `target` with the given type, if any.
    pub fn relationship_mut(
        &mut self,
        target: &Uuid,
        relationship_type: &str,
    ) -> Option<&mut Relationship> {
        self.relationships
            .iter_mut()
            .find(|r| r.target_entity_id == *target && r.relationship_type == relationship_type)
    }

    /// Mark the entity as touched now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Push a context snippet onto a source, keeping only the most recent
/// [`MAX_SOURCE_CONTEXTS`].
pub fn push_source_context(source: &mut DocumentSource, context: String) {
    if context.trim().is_empty() || source.contexts.contains(&context) {
        return;
    }
    source.contexts.push(context);
    trim_contexts(source);
}

/// Trim a source's context list down to the most recent entries.
pub fn trim_contexts(source: &mut DocumentSource) {
    if source.contexts.len() > MAX_SOURCE_CONTEXTS {
        let excess = source.contexts.len() - MAX_SOURCE_CONTEXTS;
        source.contexts.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_roundtrip() {
        for t in [
            EntityType::Person,
            EntityType::Organization,
            EntityType::Concept,
            EntityType::Technology,
            EntityType::Product,
            EntityType::Location,
            EntityType::Date,
            EntityType::Event,
            EntityType::Other,
        ] {
            let parsed: EntityType = t.to_string().parse().unwrap();
            assert_eq!(t, parsed);
        }
        assert!("galaxy".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_entity_type_serde() {
        let json = serde_json::to_string(&EntityType::Organization).unwrap();
        assert_eq!(json, "\"organization\"");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Acme   Corp "), "acme corp");
        assert_eq!(normalize_name("RUST"), "rust");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_rename_keeps_normalized_name_in_sync() {
        let mut e = Entity::new(Uuid::now_v7(), "Acme Corp", EntityType::Organization);
        assert_eq!(e.normalized_name, "acme corp");
        e.rename("ACME Corporation");
        assert_eq!(e.name, "ACME Corporation");
        assert_eq!(e.normalized_name, "acme corporation");
    }

    #[test]
    fn test_add_alias_dedupes() {
        let mut e = Entity::new(Uuid::now_v7(), "Rust", EntityType::Technology);
        assert!(e.add_alias("rust-lang"));
        assert!(!e.add_alias("Rust-Lang"));
        assert!(!e.add_alias("rust"));
        assert!(!e.add_alias("   "));
        assert_eq!(e.aliases, vec!["rust-lang".to_string()]);
    }

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(0.01), MIN_CONFIDENCE);
        assert_eq!(clamp_confidence(1.5), 1.0);
        assert_eq!(clamp_confidence(0.5), 0.5);
        assert_eq!(clamp_confidence(f32::NAN), MIN_CONFIDENCE);
    }

    #[test]
    fn test_push_source_context_caps_at_five() {
        let mut source = DocumentSource {
            source_id: "doc-1".to_string(),
            title: "Doc".to_string(),
            mention_count: 1,
            contexts: vec![],
        };
        for i in 0..8 {
            push_source_context(&mut source, format!("ctx {i}"));
        }
        assert_eq!(source.contexts.len(), MAX_SOURCE_CONTEXTS);
        assert_eq!(source.contexts[0], "ctx 3");
        assert_eq!(source.contexts[4], "ctx 7");
    }
}
