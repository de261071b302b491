//! Embedder implementations.
//!
//! - `HashingEmbedder`: deterministic feature hashing, no model download
//! - `FastEmbedder`: local ONNX model via fastembed (`local-embeddings` feature)

pub mod hashing;
#[cfg(feature = "local-embeddings")]
pub mod local;

pub use hashing::HashingEmbedder;
#[cfg(feature = "local-embeddings")]
pub use local::FastEmbedder;
