//! Infrastructure layer for mnemo.
//!
//! Contains implementations of the ports defined in `mnemo-core`: SQLite and
//! in-memory repositories, embedders, and a local extractive summarizer.

pub mod config;
pub mod embedding;
pub mod memory;
pub mod sqlite;
pub mod summarizer;
