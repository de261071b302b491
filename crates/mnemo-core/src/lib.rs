//! Business logic and port trait definitions for mnemo.
//!
//! This crate defines the "ports" (repository, embedder, and summarizer
//! traits) that the infrastructure layer implements, plus the memory
//! services built on them: entity resolution and merging, knowledge graph
//! queries, retention/decay, and context pruning. It depends only on
//! `mnemo-types` -- never on `mnemo-infra` or any database/IO crate.

pub mod context;
pub mod decay;
pub mod embedding;
pub mod entity;
pub mod graph;
pub mod repository;
pub mod similarity;
pub mod summarizer;
