pub mod embeddings;
pub mod memory_store;
pub mod qdrant_index;
pub mod vector_store;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use embeddings::{BoxFuture, Embedder, EmbeddingError, OllamaEmbedder, DEFAULT_EMBEDDING_MODEL};
pub use memory_store::InMemoryVectorStore;
pub use qdrant_index::QdrantStore;
pub use vector_store::{ScoredPoint, VectorPoint, VectorStore, VectorStoreError};

use dashmap::DashMap;
use ingest::Chunker;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Number of chunks handed to the LLM per question.
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    Store(#[from] VectorStoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub collection: String,
    pub chunks_indexed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

/// Chunks documents into a per-document collection and serves similarity
/// retrieval over it.
pub struct DocumentIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    // One writer per collection at a time.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DocumentIndex {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, chunker: Chunker) -> Self {
        Self {
            store,
            embedder,
            chunker,
            locks: DashMap::new(),
        }
    }

    /// Verify the store is reachable. Start-up treats a failure as fatal.
    pub async fn init(&self) -> Result<(), IndexError> {
        self.store.ping().await?;
        tracing::info!(embedding_model = self.embedder.model(), "Vector store reachable");
        Ok(())
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Replace the contents of `collection` with the chunks of `text`.
    ///
    /// All embeddings are computed before the collection is touched, so an
    /// embedding failure leaves the previous generation in place. Concurrent
    /// calls for the same collection run one after the other.
    pub async fn index_document(&self, text: &str, collection: &str) -> Result<IndexReport, IndexError> {
        let lock = self.locks.entry(collection.to_string()).or_default().clone();
        let _guard = lock.lock().await;

        let chunks = self.chunker.chunk_text(collection, text);

        if chunks.is_empty() {
            self.store.delete_collection(collection).await?;
            tracing::info!(collection, "Document produced no chunks; collection cleared");
            return Ok(IndexReport {
                collection: collection.to_string(),
                chunks_indexed: 0,
            });
        }

        let mut points = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let vector = self.embedder.embed(&chunk.text).await?;

            let payload = HashMap::from([
                ("collection".to_string(), serde_json::json!(chunk.collection)),
                ("chunk_id".to_string(), serde_json::json!(chunk.chunk_id)),
                ("chunk_index".to_string(), serde_json::json!(chunk.index)),
                ("text".to_string(), serde_json::json!(chunk.text)),
            ]);

            points.push(VectorPoint {
                id: uuid::Uuid::new_v4().to_string(),
                vector,
                payload,
            });
        }

        let dimension = points[0].vector.len();
        self.store.recreate_collection(collection, dimension).await?;

        let count = points.len();
        self.store.upsert(collection, points).await?;

        tracing::info!(collection, chunks = count, dimension, "Vector index rebuilt");

        Ok(IndexReport {
            collection: collection.to_string(),
            chunks_indexed: count,
        })
    }

    /// Top-`top_k` chunks of `collection` most similar to `query`.
    pub async fn retrieve(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        let query_embedding = self.embedder.embed(query).await?;
        let hits = self.store.search(collection, query_embedding, top_k).await?;

        Ok(hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                chunk_index: hit
                    .payload
                    .get("chunk_index")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as usize,
                text: hit
                    .payload
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
                score: hit.score,
            })
            .filter(|chunk| !chunk.text.is_empty())
            .collect())
    }
}
