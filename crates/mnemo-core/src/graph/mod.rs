//! Knowledge graph queries over the entity relationship set.
//!
//! - `topology`: in-memory arena-plus-index view built with petgraph
//! - `knowledge`: subgraph, path, related-entity, and cluster queries

pub mod knowledge;
pub mod topology;

pub use knowledge::KnowledgeGraph;
pub use topology::EntityTopology;
