//! Embedder trait for text-to-vector conversion.
//!
//! Implementations (local ONNX models, hashing embedders) live in mnemo-infra.

use mnemo_types::error::EmbeddingError;

/// Trait for converting text into embedding vectors.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait Embedder: Send + Sync {
    /// Embed a batch of documents. Returns one vector per input text.
    fn embed_documents(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send;

    /// Embed a single query string.
    ///
    /// Defaults to a one-element document batch. Models with distinct
    /// query/passage prefixes should override this.
    fn embed_query(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, EmbeddingError>> + Send {
        let texts = vec![text.to_string()];
        async move {
            let mut vectors = self.embed_documents(&texts).await?;
            vectors
                .pop()
                .ok_or_else(|| EmbeddingError("embedder returned no vector".to_string()))
        }
    }

    /// The model name used for embeddings (e.g., "all-MiniLM-L6-v2").
    fn model_name(&self) -> &str;

    /// The dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}
