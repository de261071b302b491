//! Pure merge rules.
//!
//! Folding a duplicate into a primary never touches storage; the merger
//! persists the result and repoints inbound edges afterwards.

use std::collections::HashSet;

use mnemo_types::entity::{Entity, Relationship, push_source_context, trim_contexts};
use uuid::Uuid;

/// Fraction of an incoming strength added to an existing relationship.
pub const RELATIONSHIP_REINFORCEMENT: f32 = 0.3;

/// Strengthen an existing relationship with newly observed evidence.
///
/// `min(1, existing + incoming * 0.3)`. Never decreases `existing`.
pub fn reinforce_strength(existing: f32, incoming: f32) -> f32 {
    let incoming = incoming.clamp(0.0, 1.0);
    (existing + incoming * RELATIONSHIP_REINFORCEMENT).min(1.0)
}

/// Fold `duplicate` into `primary`.
///
/// Aliases, sources, relationships, stats, and empty description/embedding
/// are absorbed. Relationships from the duplicate that point at the primary
/// are dropped. `document_count` is recomputed from the merged source list.
pub fn merge_into(primary: &mut Entity, duplicate: &Entity, contexts_per_merge: usize) {
    // Aliases: the duplicate's name becomes an alias of the primary.
    primary.add_alias(&duplicate.name);
    for alias in &duplicate.aliases {
        primary.add_alias(alias);
    }

    // Sources
    for dup_source in &duplicate.sources {
        match primary
            .sources
            .iter_mut()
            .find(|s| s.source_id == dup_source.source_id)
        {
            Some(existing) => {
                existing.mention_count += dup_source.mention_count;
                let fresh: Vec<String> = dup_source
                    .contexts
                    .iter()
                    .filter(|c| !existing.contexts.contains(c))
                    .take(contexts_per_merge)
                    .cloned()
                    .collect();
                for context in fresh {
                    push_source_context(existing, context);
                }
                trim_contexts(existing);
            }
            None => {
                let mut source = dup_source.clone();
                trim_contexts(&mut source);
                primary.sources.push(source);
            }
        }
    }

    // Relationships
    for rel in &duplicate.relationships {
        if rel.target_entity_id == primary.id {
            continue;
        }
        match primary.relationship_mut(&rel.target_entity_id, &rel.relationship_type) {
            Some(existing) => {
                existing.strength = reinforce_strength(existing.strength, rel.strength);
                if existing.evidence.is_none() {
                    existing.evidence = rel.evidence.clone();
                }
            }
            None => primary.relationships.push(rel.clone()),
        }
    }

    // Stats
    primary.stats.total_mentions += duplicate.stats.total_mentions;
    primary.stats.conversation_mentions += duplicate.stats.conversation_mentions;
    primary.recompute_document_count();

    if primary.description.trim().is_empty() && !duplicate.description.trim().is_empty() {
        primary.description = duplicate.description.clone();
    }
    if primary.embedding.is_empty() && !duplicate.embedding.is_empty() {
        primary.embedding = duplicate.embedding.clone();
    }
}

/// Drop the primary's own edges into entities that are about to disappear
/// into it, plus any self-loop.
pub fn drop_edges_into(primary: &mut Entity, absorbed: &[Uuid]) {
    let absorbed: HashSet<&Uuid> = absorbed.iter().collect();
    let own_id = primary.id;
    primary
        .relationships
        .retain(|r| r.target_entity_id != own_id && !absorbed.contains(&r.target_entity_id));
}

/// Rewrite `relationships` so edges into `from_ids` target `to_id`.
///
/// Self-loops on `owner_id` are dropped and a duplicate `(target, type)`
/// pair keeps the stronger edge. Returns `true` if anything changed.
pub fn repoint(
    owner_id: &Uuid,
    relationships: &mut Vec<Relationship>,
    from_ids: &[Uuid],
    to_id: &Uuid,
) -> bool {
    if !relationships
        .iter()
        .any(|r| from_ids.contains(&r.target_entity_id))
    {
        return false;
    }

    let mut rewritten: Vec<Relationship> = Vec::with_capacity(relationships.len());
    for mut rel in relationships.drain(..) {
        if from_ids.contains(&rel.target_entity_id) {
            rel.target_entity_id = *to_id;
        }
        if rel.target_entity_id == *owner_id {
            continue;
        }
        match rewritten.iter_mut().find(|r| {
            r.target_entity_id == rel.target_entity_id && r.relationship_type == rel.relationship_type
        }) {
            Some(existing) => {
                if rel.strength > existing.strength {
                    *existing = rel;
                }
            }
            None => rewritten.push(rel),
        }
    }
    *relationships = rewritten;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_types::entity::{DocumentSource, EntityType, MAX_SOURCE_CONTEXTS};

    fn entity(name: &str) -> Entity {
        Entity::new(Uuid::nil(), name, EntityType::Organization)
    }

    fn source(id: &str, mentions: u32, contexts: &[&str]) -> DocumentSource {
        DocumentSource {
            source_id: id.to_string(),
            title: id.to_uppercase(),
            mention_count: mentions,
            contexts: contexts.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn rel(target: Uuid, kind: &str, strength: f32) -> Relationship {
        Relationship {
            target_entity_id: target,
            relationship_type: kind.to_string(),
            strength,
            evidence: None,
        }
    }

    #[test]
    fn test_reinforce_strength() {
        assert!((reinforce_strength(0.5, 0.5) - 0.65).abs() < 1e-6);
        assert_eq!(reinforce_strength(0.9, 1.0), 1.0);
        assert_eq!(reinforce_strength(0.4, -3.0), 0.4);
    }

    #[test]
    fn test_merge_sums_mentions_and_recomputes_document_count() {
        let mut primary = entity("Acme Corp");
        primary.stats.total_mentions = 5;
        primary.sources = vec![source("d1", 3, &[]), source("d2", 2, &[])];
        primary.recompute_document_count();

        let mut dup = entity("Acme Corporation");
        dup.stats.total_mentions = 2;
        dup.stats.conversation_mentions = 1;
        dup.sources = vec![source("d2", 1, &[]), source("d3", 1, &[])];

        merge_into(&mut primary, &dup, 2);

        assert_eq!(primary.stats.total_mentions, 7);
        assert_eq!(primary.stats.conversation_mentions, 1);
        assert_eq!(primary.stats.document_count, 3);
        let d2 = primary.sources.iter().find(|s| s.source_id == "d2").unwrap();
        assert_eq!(d2.mention_count, 3);
        assert!(primary.has_alias("Acme Corporation"));
    }

    #[test]
    fn test_merge_caps_contexts() {
        let mut primary = entity("A");
        primary.sources = vec![source("d1", 1, &["c1", "c2", "c3", "c4"])];
        let mut dup = entity("B");
        dup.sources = vec![source("d1", 1, &["c1", "n1", "n2", "n3"])];

        merge_into(&mut primary, &dup, 2);

        let contexts = &primary.sources[0].contexts;
        assert_eq!(contexts.len(), MAX_SOURCE_CONTEXTS);
        assert!(contexts.contains(&"n1".to_string()));
        assert!(contexts.contains(&"n2".to_string()));
        assert!(!contexts.contains(&"n3".to_string()));
    }

    #[test]
    fn test_merge_reinforces_and_skips_edges_into_primary() {
        let target = Uuid::now_v7();
        let mut primary = entity("A");
        primary.relationships = vec![rel(target, "uses", 0.5)];
        let mut dup = entity("B");
        dup.relationships = vec![
            rel(target, "uses", 0.5),
            rel(primary.id, "same_as", 1.0),
            rel(target, "owns", 0.2),
        ];

        merge_into(&mut primary, &dup, 2);

        assert_eq!(primary.relationships.len(), 2);
        let uses = primary.relationship_mut(&target, "uses").unwrap();
        assert!((uses.strength - 0.65).abs() < 1e-6);
        assert!(primary.relationship_mut(&target, "owns").is_some());
    }

    #[test]
    fn test_merge_fills_empty_description_only() {
        let mut primary = entity("A");
        let mut dup = entity("B");
        dup.description = "from dup".to_string();
        dup.embedding = vec![0.1, 0.2];
        merge_into(&mut primary, &dup, 2);
        assert_eq!(primary.description, "from dup");
        assert_eq!(primary.embedding, vec![0.1, 0.2]);

        let mut other = entity("C");
        other.description = "ignored".to_string();
        merge_into(&mut primary, &other, 2);
        assert_eq!(primary.description, "from dup");
    }

    #[test]
    fn test_drop_edges_into() {
        let dup_id = Uuid::now_v7();
        let keep = Uuid::now_v7();
        let mut primary = entity("A");
        let own = primary.id;
        primary.relationships = vec![rel(dup_id, "x", 0.5), rel(own, "x", 0.5), rel(keep, "x", 0.5)];
        drop_edges_into(&mut primary, &[dup_id]);
        assert_eq!(primary.relationships.len(), 1);
        assert_eq!(primary.relationships[0].target_entity_id, keep);
    }

    #[test]
    fn test_repoint_dedups_and_drops_self_loops() {
        let owner = Uuid::now_v7();
        let primary = Uuid::now_v7();
        let dup = Uuid::now_v7();
        let mut rels = vec![
            rel(primary, "works_with", 0.4),
            rel(dup, "works_with", 0.9),
            rel(dup, "owns", 0.3),
        ];
        assert!(repoint(&owner, &mut rels, &[dup], &primary));
        assert_eq!(rels.len(), 2);
        let works = rels.iter().find(|r| r.relationship_type == "works_with").unwrap();
        assert_eq!(works.target_entity_id, primary);
        assert!((works.strength - 0.9).abs() < 1e-6);

        // Owner pointing at a duplicate of itself loses the edge.
        let mut own_rels = vec![rel(dup, "same_as", 1.0)];
        assert!(repoint(&primary, &mut own_rels, &[dup], &primary));
        assert!(own_rels.is_empty());

        let mut untouched = vec![rel(Uuid::now_v7(), "x", 0.5)];
        assert!(!repoint(&owner, &mut untouched, &[dup], &primary));
    }
}
