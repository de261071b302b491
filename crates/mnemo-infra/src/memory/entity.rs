//! In-memory `EntityRepository`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mnemo_core::entity::merge_strategy::repoint;
use mnemo_core::repository::entity::EntityRepository;
use mnemo_types::entity::{Entity, EntityType, normalize_name};
use mnemo_types::error::RepositoryError;
use uuid::Uuid;

/// Entity store keyed by id. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntityRepository {
    inner: Arc<DashMap<Uuid, Entity>>,
}

impl InMemoryEntityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of matching entities, most mentioned first.
    fn select(&self, mut predicate: impl FnMut(&Entity) -> bool, limit: Option<usize>) -> Vec<Entity> {
        let mut found: Vec<Entity> = self
            .inner
            .iter()
            .filter(|r| predicate(r.value()))
            .map(|r| r.value().clone())
            .collect();
        found.sort_by(|a, b| {
            b.stats
                .total_mentions
                .cmp(&a.stats.total_mentions)
                .then_with(|| a.normalized_name.cmp(&b.normalized_name))
        });
        if let Some(limit) = limit {
            found.truncate(limit);
        }
        found
    }
}

fn type_matches(entity: &Entity, entity_type: Option<EntityType>) -> bool {
    entity_type.is_none_or(|t| entity.entity_type == t)
}

/// Whether `haystack` contains every token, each after the previous one.
fn contains_in_order(haystack: &str, tokens: &[String]) -> bool {
    let mut rest = haystack;
    for token in tokens {
        match rest.find(token.as_str()) {
            Some(pos) => rest = &rest[pos + token.len()..],
            None => return false,
        }
    }
    true
}

impl EntityRepository for InMemoryEntityRepository {
    async fn get(&self, id: &Uuid) -> Result<Option<Entity>, RepositoryError> {
        Ok(self.inner.get(id).map(|r| r.value().clone()))
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Entity>, RepositoryError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.inner.get(id).map(|r| r.value().clone()))
            .collect())
    }

    async fn save(&self, entity: &Entity) -> Result<(), RepositoryError> {
        self.inner.insert(entity.id, entity.clone());
        Ok(())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, RepositoryError> {
        Ok(ids
            .iter()
            .filter(|id| self.inner.remove(id).is_some())
            .count() as u64)
    }

    async fn find_exact(
        &self,
        workspace_id: &Uuid,
        normalized_name: &str,
        entity_type: Option<EntityType>,
    ) -> Result<Vec<Entity>, RepositoryError> {
        Ok(self.select(
            |e| {
                e.workspace_id == *workspace_id
                    && type_matches(e, entity_type)
                    && (e.normalized_name == normalized_name
                        || e.aliases.iter().any(|a| normalize_name(a) == normalized_name))
            },
            None,
        ))
    }

    async fn find_by_name_pattern(
        &self,
        workspace_id: &Uuid,
        tokens: &[String],
        entity_type: Option<EntityType>,
        limit: usize,
    ) -> Result<Vec<Entity>, RepositoryError> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.select(
            |e| {
                e.workspace_id == *workspace_id
                    && type_matches(e, entity_type)
                    && contains_in_order(&e.normalized_name, tokens)
            },
            Some(limit),
        ))
    }

    async fn find_by_alias_prefix(
        &self,
        workspace_id: &Uuid,
        prefix: &str,
        entity_type: Option<EntityType>,
        limit: usize,
    ) -> Result<Vec<Entity>, RepositoryError> {
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.select(
            |e| {
                e.workspace_id == *workspace_id
                    && type_matches(e, entity_type)
                    && e.aliases.iter().any(|a| normalize_name(a).starts_with(prefix))
            },
            Some(limit),
        ))
    }

    async fn list_by_mentions(
        &self,
        workspace_id: &Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<Entity>, RepositoryError> {
        Ok(self.select(|e| e.workspace_id == *workspace_id, limit))
    }

    async fn list_missing_embeddings(
        &self,
        workspace_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<Entity>, RepositoryError> {
        Ok(self.select(
            |e| e.workspace_id == *workspace_id && e.embedding.is_empty(),
            Some(limit),
        ))
    }

    async fn list_stale(&self, updated_before: DateTime<Utc>) -> Result<Vec<Entity>, RepositoryError> {
        Ok(self.select(|e| e.updated_at < updated_before, None))
    }

    async fn list_prune_candidates(
        &self,
        max_mentions: u32,
        max_confidence: f32,
    ) -> Result<Vec<Entity>, RepositoryError> {
        Ok(self.select(
            |e| {
                e.stats.total_mentions < max_mentions
                    && e.relationships.is_empty()
                    && e.confidence < max_confidence
            },
            None,
        ))
    }

    async fn update_confidence(
        &self,
        id: &Uuid,
        confidence: f32,
        decayed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut entry = self.inner.get_mut(id).ok_or(RepositoryError::NotFound)?;
        entry.confidence = confidence;
        entry.last_decayed_at = Some(decayed_at);
        Ok(())
    }

    async fn repoint_relationships(
        &self,
        workspace_id: &Uuid,
        from_ids: &[Uuid],
        to_id: &Uuid,
    ) -> Result<u64, RepositoryError> {
        let mut rewritten = 0;
        for mut entry in self.inner.iter_mut() {
            let entity = entry.value_mut();
            if entity.workspace_id != *workspace_id || from_ids.contains(&entity.id) {
                continue;
            }
            let owner = entity.id;
            if repoint(&owner, &mut entity.relationships, from_ids, to_id) {
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }

    async fn count(&self, workspace_id: Option<&Uuid>) -> Result<u64, RepositoryError> {
        Ok(match workspace_id {
            Some(ws) => self.inner.iter().filter(|r| r.workspace_id == *ws).count() as u64,
            None => self.inner.len() as u64,
        })
    }

    async fn count_below_confidence(&self, threshold: f32) -> Result<u64, RepositoryError> {
        Ok(self.inner.iter().filter(|r| r.confidence < threshold).count() as u64)
    }

    async fn average_confidence(&self) -> Result<f64, RepositoryError> {
        if self.inner.is_empty() {
            return Ok(0.0);
        }
        let sum: f64 = self.inner.iter().map(|r| f64::from(r.confidence)).sum();
        Ok(sum / self.inner.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_types::entity::Relationship;

    fn named(ws: Uuid, name: &str, mentions: u32) -> Entity {
        let mut e = Entity::new(ws, name, EntityType::Technology);
        e.stats.total_mentions = mentions;
        e
    }

    #[test]
    fn test_contains_in_order() {
        let tokens = vec!["acme".to_string(), "corp".to_string()];
        assert!(contains_in_order("acme widget corp", &tokens));
        assert!(!contains_in_order("corp of acme", &tokens));
        assert!(contains_in_order("anything", &[]));
    }

    #[tokio::test]
    async fn test_find_exact_matches_alias() {
        let repo = InMemoryEntityRepository::new();
        let ws = Uuid::now_v7();
        let mut e = named(ws, "Kubernetes", 2);
        e.aliases.push("K8s".to_string());
        repo.save(&e).await.unwrap();

        assert_eq!(repo.find_exact(&ws, "k8s", None).await.unwrap().len(), 1);
        assert_eq!(repo.find_exact(&ws, "kubernetes", None).await.unwrap().len(), 1);
        assert!(repo.find_exact(&Uuid::now_v7(), "k8s", None).await.unwrap().is_empty());
        assert_eq!(repo.find_by_alias_prefix(&ws, "k8", None, 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_by_mentions_orders_and_limits() {
        let repo = InMemoryEntityRepository::new();
        let ws = Uuid::now_v7();
        for (name, m) in [("a", 1), ("b", 7), ("c", 3)] {
            repo.save(&named(ws, name, m)).await.unwrap();
        }
        let top = repo.list_by_mentions(&ws, Some(2)).await.unwrap();
        let names: Vec<_> = top.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_repoint_skips_merged_ids() {
        let repo = InMemoryEntityRepository::new();
        let ws = Uuid::now_v7();
        let primary = named(ws, "primary", 1);
        let mut dup = named(ws, "dup", 1);
        let mut other = named(ws, "other", 1);
        dup.relationships.push(Relationship {
            target_entity_id: other.id,
            relationship_type: "uses".to_string(),
            strength: 0.5,
            evidence: None,
        });
        other.relationships.push(Relationship {
            target_entity_id: dup.id,
            relationship_type: "uses".to_string(),
            strength: 0.5,
            evidence: None,
        });
        for e in [&primary, &dup, &other] {
            repo.save(e).await.unwrap();
        }

        let n = repo
            .repoint_relationships(&ws, &[dup.id], &primary.id)
            .await
            .unwrap();
        assert_eq!(n, 1);
        let other = repo.get(&other.id).await.unwrap().unwrap();
        assert_eq!(other.relationships[0].target_entity_id, primary.id);
    }

    #[tokio::test]
    async fn test_update_confidence_missing_entity() {
        let repo = InMemoryEntityRepository::new();
        let result = repo.update_confidence(&Uuid::now_v7(), 0.5, Utc::now()).await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
        assert_eq!(repo.average_confidence().await.unwrap(), 0.0);
    }
}
