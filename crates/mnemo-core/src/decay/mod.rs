//! Retention policy: conversation archival, entity confidence decay, and
//! orphan pruning.
//!
//! Only "run one pass" entry points are exposed. Scheduling lives outside
//! this crate.

pub mod manager;
pub mod policy;

pub use manager::MemoryDecayManager;
