//! FastEmbed-based local embedding generator.
//!
//! Runs BGESmallENV15 (384 dimensions) on the ONNX runtime. Model weights
//! are downloaded into the cache directory on first use. Inference is CPU
//! bound and runs on the blocking thread pool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use mnemo_core::embedding::Embedder;
use mnemo_types::error::EmbeddingError;

const MODEL_NAME: &str = "BAAI/bge-small-en-v1.5";
const DIMENSION: usize = 384;

/// Local embedder backed by a fastembed `TextEmbedding` model.
#[derive(Clone)]
pub struct FastEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedder {
    /// Load (downloading if needed) the model into `cache_dir`.
    pub fn new(cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let options = InitOptions::new(EmbeddingModel::BGESmallENV15)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(false);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError(format!("failed to load {MODEL_NAME}: {e}")))?;

        tracing::info!(model = MODEL_NAME, "local embedding model loaded");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

impl Embedder for FastEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|_| EmbeddingError("embedding model lock poisoned".to_string()))?;
            guard
                .embed(texts, None)
                .map_err(|e| EmbeddingError(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError(format!("embedding task failed: {e}")))?
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}
