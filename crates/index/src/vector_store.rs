use std::collections::HashMap;

use crate::embeddings::BoxFuture;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("collection not found: {0}")]
    MissingCollection(String),
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Collection-scoped vector storage with cosine similarity search.
pub trait VectorStore: Send + Sync {
    /// Liveness check; called once when the store is wired up.
    fn ping(&self) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Drop `collection` if it exists and create it empty.
    fn recreate_collection<'a>(
        &'a self,
        collection: &'a str,
        vector_size: usize,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>>;

    /// Drop `collection`; a missing collection is not an error.
    fn delete_collection<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<(), VectorStoreError>>;

    fn upsert<'a>(
        &'a self,
        collection: &'a str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>>;

    fn search<'a>(
        &'a self,
        collection: &'a str,
        vector: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ScoredPoint>, VectorStoreError>>;

    fn count<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<usize, VectorStoreError>>;
}
