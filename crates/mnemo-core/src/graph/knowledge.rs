//! Knowledge graph queries: subgraph extraction, shortest path, related
//! entities, clusters, and relationship maintenance.
//!
//! Traversals load entities level by level with `get_many`. A relationship
//! whose target no longer resolves (deleted, merged away, or in another
//! workspace) is treated as "edge removed".

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use mnemo_types::config::GraphConfig;
use mnemo_types::entity::{Entity, Relationship};
use mnemo_types::error::MemoryError;
use mnemo_types::graph::{
    EntityCluster, EntityPath, GraphEdge, GraphNode, GraphStats, RelatedEntity, Subgraph,
};
use uuid::Uuid;

use super::topology::EntityTopology;
use crate::entity::merge_strategy::reinforce_strength;
use crate::entity::{ensure_workspace, load_in_workspace};
use crate::repository::entity::EntityRepository;

/// Graph queries over a workspace's entities.
pub struct KnowledgeGraph<R: EntityRepository> {
    repo: R,
    config: GraphConfig,
}

impl<R: EntityRepository> KnowledgeGraph<R> {
    pub fn new(repo: R, config: GraphConfig) -> Self {
        Self { repo, config }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Breadth-first neighbourhood of `entity_id`.
    ///
    /// Stops after `depth` hops or once `max_nodes` nodes are emitted. Each
    /// node is emitted at most once, so cycles terminate. Edges are reported
    /// only between emitted nodes.
    #[tracing::instrument(name = "get_subgraph", skip(self), fields(workspace_id = %workspace_id))]
    pub async fn get_subgraph(
        &self,
        workspace_id: &Uuid,
        entity_id: &Uuid,
        depth: u32,
        max_nodes: usize,
    ) -> Result<Subgraph, MemoryError> {
        let root = load_in_workspace(&self.repo, workspace_id, entity_id).await?;
        let mut subgraph = Subgraph {
            root: root.id,
            nodes: Vec::new(),
            edges: Vec::new(),
        };
        if max_nodes == 0 {
            return Ok(subgraph);
        }

        let mut visited: HashSet<Uuid> = HashSet::from([root.id]);
        let mut emitted: Vec<Entity> = Vec::new();
        subgraph.nodes.push(graph_node(&root, 0));
        let mut frontier = vec![root.clone()];
        emitted.push(root);

        'levels: for level in 1..=depth {
            let mut next_ids: Vec<Uuid> = Vec::new();
            for entity in &frontier {
                for rel in &entity.relationships {
                    if visited.insert(rel.target_entity_id) {
                        next_ids.push(rel.target_entity_id);
                    }
                }
            }
            if next_ids.is_empty() {
                break;
            }

            let loaded = self.load_level(workspace_id, &next_ids).await?;
            let mut next_frontier = Vec::new();
            for entity in loaded {
                if subgraph.nodes.len() >= max_nodes {
                    break 'levels;
                }
                subgraph.nodes.push(graph_node(&entity, level));
                emitted.push(entity.clone());
                next_frontier.push(entity);
            }
            frontier = next_frontier;
        }

        let emitted_ids: HashSet<Uuid> = emitted.iter().map(|e| e.id).collect();
        for entity in &emitted {
            for rel in &entity.relationships {
                if emitted_ids.contains(&rel.target_entity_id) {
                    subgraph.edges.push(GraphEdge {
                        source: entity.id,
                        target: rel.target_entity_id,
                        relationship_type: rel.relationship_type.clone(),
                        strength: rel.strength,
                    });
                }
            }
        }

        tracing::debug!(
            nodes = subgraph.nodes.len(),
            edges = subgraph.edges.len(),
            "subgraph extracted"
        );
        Ok(subgraph)
    }

    /// Unweighted shortest path from `source_id` to `target_id`.
    ///
    /// Returns `Ok(None)` when the target is not reachable within
    /// `max_depth` hops.
    #[tracing::instrument(name = "find_path", skip(self), fields(workspace_id = %workspace_id))]
    pub async fn find_path(
        &self,
        workspace_id: &Uuid,
        source_id: &Uuid,
        target_id: &Uuid,
        max_depth: u32,
    ) -> Result<Option<EntityPath>, MemoryError> {
        let source = load_in_workspace(&self.repo, workspace_id, source_id).await?;
        let target = load_in_workspace(&self.repo, workspace_id, target_id).await?;

        if source.id == target.id {
            return Ok(Some(EntityPath {
                entity_ids: vec![source.id],
                entity_names: vec![source.name],
                relationship_types: Vec::new(),
            }));
        }

        let mut names: HashMap<Uuid, String> = HashMap::from([
            (source.id, source.name.clone()),
            (target.id, target.name.clone()),
        ]);
        // child -> (parent, relationship type)
        let mut parents: HashMap<Uuid, (Uuid, String)> = HashMap::new();
        let mut visited: HashSet<Uuid> = HashSet::from([source.id]);
        let mut frontier = vec![source];

        for _ in 0..max_depth {
            let mut next_ids = Vec::new();
            for entity in &frontier {
                for rel in &entity.relationships {
                    if visited.insert(rel.target_entity_id) {
                        parents.insert(
                            rel.target_entity_id,
                            (entity.id, rel.relationship_type.clone()),
                        );
                        next_ids.push(rel.target_entity_id);
                    }
                }
            }

            if parents.contains_key(&target.id) {
                return Ok(Some(reconstruct_path(&parents, &names, &target.id)));
            }
            if next_ids.is_empty() {
                break;
            }

            frontier = self.load_level(workspace_id, &next_ids).await?;
            for entity in &frontier {
                names.insert(entity.id, entity.name.clone());
            }
        }

        tracing::debug!("no path within max depth");
        Ok(None)
    }

    /// Entities referenced by the seeds, ranked by summed edge strength.
    ///
    /// Edges weaker than `min_strength` are ignored and the seeds themselves
    /// are excluded from the result.
    #[tracing::instrument(
        name = "get_related_entities",
        skip(self, seed_ids),
        fields(workspace_id = %workspace_id, seed_count = seed_ids.len())
    )]
    pub async fn get_related_entities(
        &self,
        workspace_id: &Uuid,
        seed_ids: &[Uuid],
        max_results: usize,
        min_strength: f32,
    ) -> Result<Vec<RelatedEntity>, MemoryError> {
        let seeds = self.load_seeds(workspace_id, seed_ids).await?;
        let seed_set: HashSet<Uuid> = seeds.iter().map(|s| s.id).collect();

        struct Accumulated {
            score: f32,
            referenced_by: Vec<Uuid>,
            relationship_types: Vec<String>,
        }

        let mut scores: HashMap<Uuid, Accumulated> = HashMap::new();
        let mut order: Vec<Uuid> = Vec::new();
        for seed in &seeds {
            for rel in &seed.relationships {
                if rel.strength < min_strength || seed_set.contains(&rel.target_entity_id) {
                    continue;
                }
                let acc = scores.entry(rel.target_entity_id).or_insert_with(|| {
                    order.push(rel.target_entity_id);
                    Accumulated {
                        score: 0.0,
                        referenced_by: Vec::new(),
                        relationship_types: Vec::new(),
                    }
                });
                acc.score += rel.strength;
                if !acc.referenced_by.contains(&seed.id) {
                    acc.referenced_by.push(seed.id);
                }
                if !acc.relationship_types.contains(&rel.relationship_type) {
                    acc.relationship_types.push(rel.relationship_type.clone());
                }
            }
        }

        let targets = self.load_level(workspace_id, &order).await?;
        let mut related: Vec<RelatedEntity> = targets
            .into_iter()
            .filter_map(|entity| {
                let acc = scores.remove(&entity.id)?;
                Some(RelatedEntity {
                    entity_id: entity.id,
                    name: entity.name,
                    entity_type: entity.entity_type,
                    score: acc.score,
                    referenced_by: acc.referenced_by,
                    relationship_types: acc.relationship_types,
                })
            })
            .collect();

        related.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        related.truncate(max_results);
        Ok(related)
    }

    /// Connected components of the undirected relationship graph.
    ///
    /// Components smaller than `min_size` are dropped. Each cluster is
    /// labelled by its highest-mention member. Sorted by size DESC and
    /// capped at `max_clusters`.
    #[tracing::instrument(name = "find_clusters", skip(self), fields(workspace_id = %workspace_id))]
    pub async fn find_clusters(
        &self,
        workspace_id: &Uuid,
        min_size: usize,
        max_clusters: usize,
    ) -> Result<Vec<EntityCluster>, MemoryError> {
        let entities = self.repo.list_by_mentions(workspace_id, None).await?;
        let by_id: HashMap<Uuid, &Entity> = entities.iter().map(|e| (e.id, e)).collect();
        let topology = EntityTopology::build(&entities);

        let mut clusters: Vec<EntityCluster> = topology
            .connected_components()
            .into_iter()
            .filter(|members| members.len() >= min_size.max(1))
            .filter_map(|members| {
                let label_entity = members
                    .iter()
                    .filter_map(|id| by_id.get(id).copied())
                    .max_by(|a, b| {
                        a.stats
                            .total_mentions
                            .cmp(&b.stats.total_mentions)
                            .then_with(|| b.name.cmp(&a.name))
                    })?;
                Some(EntityCluster {
                    label: label_entity.name.clone(),
                    label_entity_id: label_entity.id,
                    size: members.len(),
                    member_ids: members,
                })
            })
            .collect();

        clusters.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.label.cmp(&b.label)));
        clusters.truncate(max_clusters);
        Ok(clusters)
    }

    /// Add or reinforce a directed relationship from `source_id` to `target_id`.
    ///
    /// An existing `(target, type)` edge is reinforced with the shared merge
    /// rule; a new edge starts at `strength` clamped to `[0, 1]`.
    #[tracing::instrument(
        name = "add_relationship",
        skip(self, evidence),
        fields(workspace_id = %workspace_id, source_id = %source_id, target_id = %target_id)
    )]
    pub async fn add_relationship(
        &self,
        workspace_id: &Uuid,
        source_id: &Uuid,
        target_id: &Uuid,
        relationship_type: &str,
        strength: f32,
        evidence: Option<String>,
    ) -> Result<Entity, MemoryError> {
        if source_id == target_id {
            return Err(MemoryError::InvalidInput(
                "an entity cannot relate to itself".to_string(),
            ));
        }
        let relationship_type = relationship_type.trim();
        if relationship_type.is_empty() {
            return Err(MemoryError::InvalidInput(
                "relationship type cannot be empty".to_string(),
            ));
        }

        let mut source = load_in_workspace(&self.repo, workspace_id, source_id).await?;
        load_in_workspace(&self.repo, workspace_id, target_id).await?;

        match source.relationship_mut(target_id, relationship_type) {
            Some(existing) => {
                existing.strength = reinforce_strength(existing.strength, strength);
                if evidence.is_some() {
                    existing.evidence = evidence;
                }
            }
            None => source.relationships.push(Relationship {
                target_entity_id: *target_id,
                relationship_type: relationship_type.to_string(),
                strength: strength.clamp(0.0, 1.0),
                evidence,
            }),
        }

        source.touch();
        self.repo.save(&source).await?;
        Ok(source)
    }

    /// Markdown block describing the seed entities and their strongest
    /// neighbours, for downstream prompt assembly.
    ///
    /// Returns an empty string when no seed resolves.
    #[tracing::instrument(
        name = "build_knowledge_context",
        skip(self, seed_ids),
        fields(workspace_id = %workspace_id, seed_count = seed_ids.len())
    )]
    pub async fn build_knowledge_context(
        &self,
        workspace_id: &Uuid,
        seed_ids: &[Uuid],
        max_related: usize,
    ) -> Result<String, MemoryError> {
        let seeds = self.load_seeds(workspace_id, seed_ids).await?;
        if seeds.is_empty() {
            return Ok(String::new());
        }

        let target_ids: Vec<Uuid> = seeds
            .iter()
            .flat_map(|s| s.relationships.iter().map(|r| r.target_entity_id))
            .collect();
        let names: HashMap<Uuid, String> = self
            .load_level(workspace_id, &target_ids)
            .await?
            .into_iter()
            .map(|e| (e.id, e.name))
            .collect();

        let mut out = String::from("## Known entities\n");
        for seed in &seeds {
            let _ = write!(out, "- {} ({})", seed.name, seed.entity_type);
            if !seed.description.trim().is_empty() {
                let _ = write!(out, ": {}", seed.description.trim());
            }
            if !seed.aliases.is_empty() {
                let _ = write!(out, " [also: {}]", seed.aliases.join(", "));
            }
            out.push('\n');

            let mut rels: Vec<&Relationship> = seed
                .relationships
                .iter()
                .filter(|r| names.contains_key(&r.target_entity_id))
                .collect();
            rels.sort_by(|a, b| b.strength.total_cmp(&a.strength));
            for rel in rels {
                let _ = writeln!(
                    out,
                    "  - {} -> {} ({:.2})",
                    rel.relationship_type, names[&rel.target_entity_id], rel.strength
                );
            }
        }

        let related = self
            .get_related_entities(
                workspace_id,
                seed_ids,
                max_related,
                self.config.related_min_strength,
            )
            .await?;
        if !related.is_empty() {
            out.push_str("\n## Related entities\n");
            for r in &related {
                let _ = writeln!(
                    out,
                    "- {} ({}), score {:.2}, via {}",
                    r.name,
                    r.entity_type,
                    r.score,
                    r.relationship_types.join(", ")
                );
            }
        }

        Ok(out)
    }

    /// Shape of a workspace's graph.
    #[tracing::instrument(name = "graph_stats", skip(self), fields(workspace_id = %workspace_id))]
    pub async fn graph_stats(&self, workspace_id: &Uuid) -> Result<GraphStats, MemoryError> {
        let entities = self.repo.list_by_mentions(workspace_id, None).await?;
        let topology = EntityTopology::build(&entities);
        let relationship_count: usize = entities.iter().map(|e| e.relationships.len()).sum();
        let average_out_degree = if entities.is_empty() {
            0.0
        } else {
            relationship_count as f64 / entities.len() as f64
        };

        Ok(GraphStats {
            entity_count: topology.node_count(),
            relationship_count,
            dangling_relationships: topology.dangling_count(),
            isolated_entities: topology.isolated_count(),
            average_out_degree,
        })
    }

    /// Load a BFS level in request order, dropping ids that no longer
    /// resolve or that live in another workspace.
    async fn load_level(
        &self,
        workspace_id: &Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Entity>, MemoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut loaded: HashMap<Uuid, Entity> = self
            .repo
            .get_many(ids)
            .await?
            .into_iter()
            .filter(|e| e.workspace_id == *workspace_id)
            .map(|e| (e.id, e))
            .collect();
        Ok(ids.iter().filter_map(|id| loaded.remove(id)).collect())
    }

    /// Load seed entities, raising on a missing or cross-workspace seed.
    async fn load_seeds(
        &self,
        workspace_id: &Uuid,
        seed_ids: &[Uuid],
    ) -> Result<Vec<Entity>, MemoryError> {
        let mut unique: Vec<Uuid> = Vec::with_capacity(seed_ids.len());
        for id in seed_ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        let found = self.repo.get_many(&unique).await?;
        let mut seeds = Vec::with_capacity(unique.len());
        for id in &unique {
            let seed = found
                .iter()
                .find(|e| e.id == *id)
                .ok_or(MemoryError::EntityNotFound(*id))?;
            ensure_workspace(seed, workspace_id)?;
            seeds.push(seed.clone());
        }
        Ok(seeds)
    }
}

/// Importance weight: mean of `log10(x + 1)` over mentions, document
/// count, and relationship count.
pub fn importance_weight(entity: &Entity) -> f64 {
    let damp = |x: usize| (x as f64 + 1.0).log10();
    (damp(entity.stats.total_mentions as usize)
        + damp(entity.stats.document_count as usize)
        + damp(entity.relationships.len()))
        / 3.0
}

fn graph_node(entity: &Entity, depth: u32) -> GraphNode {
    GraphNode {
        entity_id: entity.id,
        name: entity.name.clone(),
        entity_type: entity.entity_type,
        importance: importance_weight(entity),
        depth,
    }
}

fn reconstruct_path(
    parents: &HashMap<Uuid, (Uuid, String)>,
    names: &HashMap<Uuid, String>,
    target: &Uuid,
) -> EntityPath {
    let mut ids = vec![*target];
    let mut relationship_types = Vec::new();
    let mut current = *target;
    while let Some((parent, rel_type)) = parents.get(&current) {
        ids.push(*parent);
        relationship_types.push(rel_type.clone());
        current = *parent;
    }
    ids.reverse();
    relationship_types.reverse();

    let entity_names = ids
        .iter()
        .map(|id| names.get(id).cloned().unwrap_or_else(|| id.to_string()))
        .collect();

    EntityPath {
        entity_ids: ids,
        entity_names,
        relationship_types,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_types::entity::EntityType;

    #[test]
    fn test_importance_weight_damped() {
        let mut e = Entity::new(Uuid::nil(), "Rust", EntityType::Technology);
        assert_eq!(importance_weight(&e), 0.0);

        e.stats.total_mentions = 9;
        e.stats.document_count = 9;
        for _ in 0..9 {
            e.relationships.push(Relationship {
                target_entity_id: Uuid::now_v7(),
                relationship_type: "uses".to_string(),
                strength: 0.5,
                evidence: None,
            });
        }
        assert!((importance_weight(&e) - 1.0).abs() < 1e-9);

        e.stats.total_mentions = 999;
        // log10(1000) = 3, so (3 + 1 + 1) / 3
        assert!((importance_weight(&e) - 5.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_reconstruct_path() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let c = Uuid::now_v7();
        let parents = HashMap::from([
            (b, (a, "works_at".to_string())),
            (c, (b, "located_in".to_string())),
        ]);
        let names = HashMap::from([
            (a, "Alice".to_string()),
            (b, "Acme".to_string()),
            (c, "Berlin".to_string()),
        ]);
        let path = reconstruct_path(&parents, &names, &c);
        assert_eq!(path.entity_ids, vec![a, b, c]);
        assert_eq!(path.entity_names, vec!["Alice", "Acme", "Berlin"]);
        assert_eq!(path.relationship_types, vec!["works_at", "located_in"]);
        assert_eq!(path.len(), 2);
    }
}
