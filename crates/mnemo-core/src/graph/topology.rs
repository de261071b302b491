//! Arena-plus-index view of a workspace's relationship graph.
//!
//! Nodes are entity ids, never entity references. Edges whose target is not
//! in the arena are counted as dangling and otherwise ignored.

use std::collections::{HashMap, HashSet};

use mnemo_types::entity::Entity;
use petgraph::graph::{DiGraph, NodeIndex};
use uuid::Uuid;

/// Directed relationship graph over a set of entities.
pub struct EntityTopology {
    graph: DiGraph<Uuid, f32>,
    index: HashMap<Uuid, NodeIndex>,
    dangling: usize,
}

impl EntityTopology {
    /// Build the graph from a snapshot of entities.
    pub fn build(entities: &[Entity]) -> Self {
        let mut graph = DiGraph::<Uuid, f32>::new();
        let mut index: HashMap<Uuid, NodeIndex> = HashMap::with_capacity(entities.len());
        for entity in entities {
            index
                .entry(entity.id)
                .or_insert_with(|| graph.add_node(entity.id));
        }

        let mut dangling = 0;
        for entity in entities {
            let from = index[&entity.id];
            for rel in &entity.relationships {
                match index.get(&rel.target_entity_id) {
                    Some(&to) if to != from => {
                        graph.add_edge(from, to, rel.strength);
                    }
                    Some(_) => {}
                    None => dangling += 1,
                }
            }
        }

        Self {
            graph,
            index,
            dangling,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Relationships whose target id is not part of the snapshot.
    pub fn dangling_count(&self) -> usize {
        self.dangling
    }

    /// Nodes with no edge in either direction.
    pub fn isolated_count(&self) -> usize {
        self.graph
            .node_indices()
            .filter(|&n| self.graph.neighbors_undirected(n).next().is_none())
            .count()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.index.contains_key(id)
    }

    /// Connected components of the undirected view, found by flood-fill.
    ///
    /// Components come out in node insertion order; ids inside a component
    /// are in discovery order.
    pub fn connected_components(&self) -> Vec<Vec<Uuid>> {
        let mut seen: HashSet<NodeIndex> = HashSet::with_capacity(self.graph.node_count());
        let mut components = Vec::new();

        for start in self.graph.node_indices() {
            if !seen.insert(start) {
                continue;
            }
            let mut component = vec![self.graph[start]];
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                for neighbor in self.graph.neighbors_undirected(node) {
                    if seen.insert(neighbor) {
                        component.push(self.graph[neighbor]);
                        stack.push(neighbor);
                    }
                }
            }
            components.push(component);
        }

        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_types::entity::{EntityType, Relationship};

    fn entity(name: &str) -> Entity {
        Entity::new(Uuid::nil(), name, EntityType::Concept)
    }

    fn link(from: &mut Entity, to: &Uuid) {
        from.relationships.push(Relationship {
            target_entity_id: *to,
            relationship_type: "related_to".to_string(),
            strength: 0.5,
            evidence: None,
        });
    }

    #[test]
    fn test_components_ignore_edge_direction() {
        let mut a = entity("a");
        let b = entity("b");
        let mut c = entity("c");
        let d = entity("d");
        link(&mut a, &b.id);
        link(&mut c, &b.id);

        let topology = EntityTopology::build(&[a.clone(), b.clone(), c.clone(), d.clone()]);
        let mut components = topology.connected_components();
        components.sort_by_key(|c| std::cmp::Reverse(c.len()));

        assert_eq!(components.len(), 2);
        assert_eq!(components[0].len(), 3);
        assert!(components[0].contains(&c.id));
        assert_eq!(components[1], vec![d.id]);
        assert_eq!(topology.isolated_count(), 1);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut a = entity("a");
        let mut b = entity("b");
        let mut c = entity("c");
        link(&mut a, &b.id);
        link(&mut b, &c.id);
        link(&mut c, &a.id);

        let topology = EntityTopology::build(&[a, b, c]);
        let components = topology.connected_components();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), 3);
        assert_eq!(topology.edge_count(), 3);
    }

    #[test]
    fn test_dangling_edges_counted_not_followed() {
        let mut a = entity("a");
        link(&mut a, &Uuid::now_v7());
        let own = a.id;
        link(&mut a, &own);

        let topology = EntityTopology::build(&[a]);
        assert_eq!(topology.dangling_count(), 1);
        assert_eq!(topology.edge_count(), 0);
        assert_eq!(topology.connected_components().len(), 1);
    }
}
