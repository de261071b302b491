//! BoxEmbedder -- object-safe dynamic dispatch wrapper for Embedder.
//!
//! 1. `EmbedderDyn` is an object-safe mirror of `Embedder` with boxed futures
//! 2. A blanket impl covers every `T: Embedder`
//! 3. `BoxEmbedder` wraps `Box<dyn EmbedderDyn>` and itself implements `Embedder`,
//!    so services generic over `E: Embedder` accept it unchanged

use std::future::Future;
use std::pin::Pin;

use mnemo_types::error::EmbeddingError;

use super::embedder::Embedder;

type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EmbeddingError>> + Send + 'a>>;

/// Object-safe version of [`Embedder`] with boxed futures.
pub trait EmbedderDyn: Send + Sync {
    fn embed_documents_boxed<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>>;

    fn embed_query_boxed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>>;

    fn model_name_dyn(&self) -> &str;

    fn dimension_dyn(&self) -> usize;
}

impl<T: Embedder> EmbedderDyn for T {
    fn embed_documents_boxed<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>> {
        Box::pin(self.embed_documents(texts))
    }

    fn embed_query_boxed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>> {
        Box::pin(self.embed_query(text))
    }

    fn model_name_dyn(&self) -> &str {
        self.model_name()
    }

    fn dimension_dyn(&self) -> usize {
        self.dimension()
    }
}

/// Type-erased embedder for runtime selection.
///
/// Since `Embedder` uses RPITIT, it cannot be used as a trait object directly.
/// The CLI picks a model from configuration and hands the services a
/// `BoxEmbedder`.
pub struct BoxEmbedder {
    inner: Box<dyn EmbedderDyn + Send + Sync>,
}

impl BoxEmbedder {
    /// Wrap a concrete `Embedder` in a type-erased box.
    pub fn new<T: Embedder + 'static>(embedder: T) -> Self {
        Self {
            inner: Box::new(embedder),
        }
    }
}

impl Embedder for BoxEmbedder {
    fn embed_documents(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send {
        async move { self.inner.embed_documents_boxed(texts).await }
    }

    fn embed_query(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, EmbeddingError>> + Send {
        async move { self.inner.embed_query_boxed(text).await }
    }

    fn model_name(&self) -> &str {
        self.inner.model_name_dyn()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension_dyn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstantEmbedder;

    impl Embedder for ConstantEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn model_name(&self) -> &str {
            "constant"
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn test_box_embedder_delegates() {
        let boxed = BoxEmbedder::new(ConstantEmbedder);
        assert_eq!(boxed.model_name(), "constant");
        assert_eq!(boxed.dimension(), 2);

        let vectors = boxed
            .embed_documents(&["ab".to_string(), "abcd".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![2.0, 1.0], vec![4.0, 1.0]]);

        let query = boxed.embed_query("xyz").await.unwrap();
        assert_eq!(query, vec![3.0, 1.0]);
    }
}
