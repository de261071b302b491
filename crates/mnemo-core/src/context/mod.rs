//! Token-bounded context assembly for a live query.
//!
//! - `tokens`: the `ceil(chars / 4)` token estimate
//! - `complexity`: query complexity score that scales the budget
//! - `pruning`: scoring, classification, and greedy selection

pub mod complexity;
pub mod pruning;
pub mod tokens;

pub use pruning::ContextPruningEngine;
