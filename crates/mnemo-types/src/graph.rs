//! Knowledge graph query result types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityType;

/// An entity emitted by a subgraph traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub entity_id: Uuid,
    pub name: String,
    pub entity_type: EntityType,
    /// Damped importance: mean of `log10(x + 1)` over mentions, documents,
    /// and relationship count.
    pub importance: f64,
    /// Hops from the traversal root.
    pub depth: u32,
}

/// A relationship between two emitted nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: Uuid,
    pub target: Uuid,
    pub relationship_type: String,
    pub strength: f32,
}

/// A bounded neighbourhood around a root entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subgraph {
    pub root: Uuid,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Shortest relationship path between two entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityPath {
    pub entity_ids: Vec<Uuid>,
    pub entity_names: Vec<String>,
    /// `relationship_types[i]` labels the hop `entity_ids[i] -> entity_ids[i + 1]`.
    pub relationship_types: Vec<String>,
}

impl EntityPath {
    /// Number of hops in the path.
    pub fn len(&self) -> usize {
        self.relationship_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationship_types.is_empty()
    }
}

/// An entity reachable from a seed set, ranked by summed relationship strength.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub entity_id: Uuid,
    pub name: String,
    pub entity_type: EntityType,
    pub score: f32,
    /// Seeds with an edge to this entity.
    pub referenced_by: Vec<Uuid>,
    pub relationship_types: Vec<String>,
}

/// A connected component of the (undirected) relationship graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCluster {
    /// Name of the highest-mention member.
    pub label: String,
    pub label_entity_id: Uuid,
    pub member_ids: Vec<Uuid>,
    pub size: usize,
}

/// Shape summary of a workspace graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub entity_count: usize,
    pub relationship_count: usize,
    /// Relationships whose target no longer resolves.
    pub dangling_relationships: usize,
    pub isolated_entities: usize,
    pub average_out_degree: f64,
}
