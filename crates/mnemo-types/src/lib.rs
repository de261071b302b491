//! Shared domain types for mnemo.
//!
//! This crate contains the domain types used across the memory layer:
//! entities and their relationships, conversations and summaries, and the
//! result types returned by resolution, graph, decay, and context pruning.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod context;
pub mod conversation;
pub mod decay;
pub mod entity;
pub mod error;
pub mod graph;
pub mod resolution;
