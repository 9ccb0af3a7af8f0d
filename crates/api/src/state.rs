use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use assess::{Advisor, Assessor, LanguageModel, OllamaClient};
use controls::{ControlSource, ControlStore};
use index::{DocumentIndex, Embedder, InMemoryVectorStore, OllamaEmbedder, QdrantStore, VectorStore};
use ingest::{Chunker, ChunkerConfig};
use query::DocumentChat;

use crate::config::{AppConfig, VectorBackend};
use crate::metrics::Metrics;

/// Everything a request handler needs, built once at start-up.
pub struct AppContext {
    pub upload_dir: PathBuf,
    pub index: Arc<DocumentIndex>,
    pub catalogue: Arc<dyn ControlSource>,
    pub llm: Arc<dyn LanguageModel>,
    pub assessor: Assessor,
    pub advisor: Advisor,
    pub chat: DocumentChat,
    pub metrics: Arc<Metrics>,
}

impl AppContext {
    /// Build the production context. The vector store is pinged once; an
    /// unreachable store is a start-up error.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let store: Arc<dyn VectorStore> = match config.vector_store.backend {
            VectorBackend::Qdrant => Arc::new(
                QdrantStore::new(config.vector_store.url.clone(), config.llm.timeout())
                    .context("Failed to build Qdrant client")?,
            ),
            VectorBackend::Memory => Arc::new(InMemoryVectorStore::new()),
        };

        let embedder: Arc<dyn Embedder> = Arc::new(
            OllamaEmbedder::new(
                config.embeddings.base_url.clone(),
                config.embeddings.model.clone(),
                config.llm.timeout(),
            )
            .context("Failed to build embedding client")?,
        );

        let llm: Arc<dyn LanguageModel> = Arc::new(
            OllamaClient::new(
                config.llm.base_url.clone(),
                config.llm.model.clone(),
                config.llm.api_key.clone(),
                config.llm.timeout(),
            )
            .context("Failed to build LLM client")?,
        );

        let catalogue: Arc<dyn ControlSource> = Arc::new(ControlStore::new(&config.server.data_dir));

        let context = Self::from_parts(config, store, embedder, llm, catalogue);
        context
            .index
            .init()
            .await
            .context("Vector store is unreachable")?;

        tokio::fs::create_dir_all(&context.upload_dir)
            .await
            .with_context(|| format!("Failed to create upload dir {}", context.upload_dir.display()))?;

        tracing::info!(
            backend = ?config.vector_store.backend,
            model = context.llm.model(),
            upload_dir = %context.upload_dir.display(),
            "Application context ready"
        );

        Ok(context)
    }

    /// Wire a context from already-built components.
    pub fn from_parts(
        config: &AppConfig,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
        catalogue: Arc<dyn ControlSource>,
    ) -> Self {
        let chunker = Chunker::new(ChunkerConfig {
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
            ..ChunkerConfig::default()
        });
        let index = Arc::new(DocumentIndex::new(store, embedder, chunker));
        let temperatures = config.llm.temperatures;

        Self {
            upload_dir: config.server.upload_dir.clone(),
            assessor: Assessor::new(llm.clone(), catalogue.clone()).with_temperature(temperatures.assessment),
            advisor: Advisor::new(llm.clone()).with_temperatures(temperatures.draft, temperatures.risks),
            chat: DocumentChat::new(index.clone(), llm.clone())
                .with_top_k(config.vector_store.top_k)
                .with_temperature(temperatures.chat),
            index,
            catalogue,
            llm,
            metrics: Metrics::new(),
        }
    }
}
