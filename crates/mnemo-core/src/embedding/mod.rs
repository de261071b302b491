//! Embedding ports and helpers.
//!
//! - `embedder`: RPITIT `Embedder` trait implemented in mnemo-infra
//! - `box_embedder`: type-erased wrapper for runtime model selection
//! - `cache`: bounded FIFO cache of text embeddings used during context pruning

pub mod box_embedder;
pub mod cache;
pub mod embedder;

pub use box_embedder::BoxEmbedder;
pub use cache::EmbeddingCache;
pub use embedder::Embedder;
