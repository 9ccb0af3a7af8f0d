use dashmap::DashMap;

use crate::embeddings::BoxFuture;
use crate::vector_store::{ScoredPoint, VectorPoint, VectorStore, VectorStoreError};

struct Collection {
    dimension: usize,
    points: Vec<VectorPoint>,
}

/// Process-local store with brute-force cosine search.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: DashMap<String, Collection>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl InMemoryVectorStore {
    fn upsert_sync(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), VectorStoreError> {
        let mut entry = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::MissingCollection(collection.to_string()))?;

        for point in points {
            if point.vector.len() != entry.dimension {
                return Err(VectorStoreError::Dimension {
                    expected: entry.dimension,
                    actual: point.vector.len(),
                });
            }
            match entry.points.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point,
                None => entry.points.push(point),
            }
        }
        Ok(())
    }

    fn search_sync(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let entry = self
            .collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::MissingCollection(collection.to_string()))?;

        let mut scored: Vec<ScoredPoint> = entry
            .points
            .iter()
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: cosine_similarity(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }
}

impl VectorStore for InMemoryVectorStore {
    fn ping(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async { Ok(()) })
    }

    fn recreate_collection<'a>(
        &'a self,
        collection: &'a str,
        vector_size: usize,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        self.collections.insert(
            collection.to_string(),
            Collection {
                dimension: vector_size,
                points: Vec::new(),
            },
        );
        Box::pin(async { Ok(()) })
    }

    fn delete_collection<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        self.collections.remove(collection);
        Box::pin(async { Ok(()) })
    }

    fn upsert<'a>(
        &'a self,
        collection: &'a str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        let result = self.upsert_sync(collection, points);
        Box::pin(async move { result })
    }

    fn search<'a>(
        &'a self,
        collection: &'a str,
        vector: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ScoredPoint>, VectorStoreError>> {
        let result = self.search_sync(collection, &vector, limit);
        Box::pin(async move { result })
    }

    fn count<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<usize, VectorStoreError>> {
        let result = self
            .collections
            .get(collection)
            .map(|c| c.points.len())
            .ok_or_else(|| VectorStoreError::MissingCollection(collection.to_string()));
        Box::pin(async move { result })
    }
}
