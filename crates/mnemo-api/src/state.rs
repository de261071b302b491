//! Application state wiring all services together.
//!
//! Services are generic over repository/embedder/summarizer traits; AppState
//! pins them to the SQLite repositories, the extractive summarizer, and a
//! `BoxEmbedder` chosen at runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use mnemo_core::context::ContextPruningEngine;
use mnemo_core::decay::MemoryDecayManager;
use mnemo_core::embedding::{BoxEmbedder, Embedder};
use mnemo_core::entity::{EntityMerger, EntityResolver};
use mnemo_core::graph::KnowledgeGraph;
use mnemo_infra::config::{data_dir, load_memory_config, resolve_database_url};
use mnemo_infra::embedding::HashingEmbedder;
use mnemo_infra::sqlite::conversation::SqliteConversationRepository;
use mnemo_infra::sqlite::entity::SqliteEntityRepository;
use mnemo_infra::sqlite::pool::DatabasePool;
use mnemo_infra::summarizer::ExtractiveSummarizer;
use mnemo_types::config::MemoryConfig;

use crate::cli::EmbedderKind;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteResolver = EntityResolver<SqliteEntityRepository, BoxEmbedder>;

pub type ConcreteMerger = EntityMerger<SqliteEntityRepository, BoxEmbedder>;

pub type ConcreteGraph = KnowledgeGraph<SqliteEntityRepository>;

pub type ConcreteSummarizer = ExtractiveSummarizer<SqliteConversationRepository>;

pub type ConcreteDecayManager =
    MemoryDecayManager<SqliteEntityRepository, SqliteConversationRepository, ConcreteSummarizer>;

pub type ConcretePruningEngine = ContextPruningEngine<SqliteConversationRepository, BoxEmbedder>;

/// Shared state for one CLI invocation.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<ConcreteResolver>,
    pub merger: Arc<ConcreteMerger>,
    pub graph: Arc<ConcreteGraph>,
    pub decay: Arc<ConcreteDecayManager>,
    pub pruning: Arc<ConcretePruningEngine>,
    pub summarizer: Arc<ConcreteSummarizer>,
    pub entities: SqliteEntityRepository,
    pub conversations: SqliteConversationRepository,
    pub db: DatabasePool,
    pub embedder: Arc<BoxEmbedder>,
    pub config: MemoryConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load config, open the database, and wire services.
    pub async fn init(embedder_kind: EmbedderKind) -> anyhow::Result<Self> {
        let data_dir = data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_memory_config(&data_dir).await;

        let db_url = resolve_database_url(&config, &data_dir);
        let db_pool = DatabasePool::new(&db_url)
            .await
            .with_context(|| format!("failed to open database at {db_url}"))?;

        let entities = SqliteEntityRepository::new(db_pool.clone());
        let conversations = SqliteConversationRepository::new(db_pool.clone());

        let embedder = Arc::new(build_embedder(embedder_kind, &data_dir)?);
        tracing::debug!(
            model = embedder.model_name(),
            dimension = embedder.dimension(),
            "embedder ready"
        );

        let summarizer = Arc::new(ExtractiveSummarizer::new(conversations.clone()));

        let resolver = EntityResolver::new(
            entities.clone(),
            embedder.clone(),
            config.resolution.clone(),
        );
        let merger = EntityMerger::new(entities.clone(), embedder.clone(), config.merge.clone());
        let graph = KnowledgeGraph::new(entities.clone(), config.graph.clone());
        let decay = MemoryDecayManager::new(
            entities.clone(),
            conversations.clone(),
            summarizer.clone(),
            config.decay.clone(),
        );
        let pruning = ContextPruningEngine::new(
            conversations.clone(),
            embedder.clone(),
            config.pruning.clone(),
        );

        Ok(Self {
            resolver: Arc::new(resolver),
            merger: Arc::new(merger),
            graph: Arc::new(graph),
            decay: Arc::new(decay),
            pruning: Arc::new(pruning),
            summarizer,
            entities,
            conversations,
            db: db_pool,
            embedder,
            config,
            data_dir,
        })
    }
}

#[cfg_attr(not(feature = "local-embeddings"), allow(unused_variables))]
fn build_embedder(kind: EmbedderKind, data_dir: &Path) -> anyhow::Result<BoxEmbedder> {
    match kind {
        EmbedderKind::Hashing => Ok(BoxEmbedder::new(HashingEmbedder::default())),
        #[cfg(feature = "local-embeddings")]
        EmbedderKind::Local => {
            let embedder = mnemo_infra::embedding::FastEmbedder::new(data_dir.join("models"))
                .context("failed to load local embedding model")?;
            Ok(BoxEmbedder::new(embedder))
        }
        #[cfg(not(feature = "local-embeddings"))]
        EmbedderKind::Local => anyhow::bail!(
            "local embeddings are not available in this build (enable the `local-embeddings` feature)"
        ),
    }
}
