use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::embeddings::BoxFuture;
use crate::vector_store::{ScoredPoint, VectorPoint, VectorStore, VectorStoreError};

/// Qdrant over its REST API; one collection per indexed document.
pub struct QdrantStore {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct UpsertPoints<'a> {
    points: Vec<Point<'a>>,
}

#[derive(Serialize)]
struct Point<'a> {
    id: &'a str,
    vector: &'a [f32],
    payload: &'a HashMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct SearchRequest {
    vector: Vec<f32>,
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    id: serde_json::Value,
    score: f32,
    #[serde(default)]
    payload: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Deserialize)]
struct CountResponse {
    result: CountResult,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

impl QdrantStore {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, VectorStoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.base_url, collection)
    }

    async fn do_ping(&self) -> Result<(), VectorStoreError> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VectorStoreError::Connection(format!(
                "Qdrant health check returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn do_delete(&self, collection: &str) -> Result<(), VectorStoreError> {
        let response = self
            .client
            .delete(self.collection_url(collection))
            .send()
            .await
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(VectorStoreError::Collection(format!(
            "Failed to delete collection '{}': {}",
            collection, error_text
        )))
    }

    async fn do_recreate(&self, collection: &str, vector_size: usize) -> Result<(), VectorStoreError> {
        self.do_delete(collection).await?;

        let create_req = CreateCollection {
            vectors: VectorParams {
                size: vector_size,
                distance: "Cosine",
            },
        };

        let response = self
            .client
            .put(self.collection_url(collection))
            .json(&create_req)
            .send()
            .await
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::Collection(format!(
                "Failed to create collection '{}': {}",
                collection, error_text
            )));
        }

        tracing::debug!(collection, dimension = vector_size, "Qdrant collection created");
        Ok(())
    }

    async fn do_upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), VectorStoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let upsert_req = UpsertPoints {
            points: points
                .iter()
                .map(|p| Point {
                    id: &p.id,
                    vector: &p.vector,
                    payload: &p.payload,
                })
                .collect(),
        };

        let url = format!("{}/points?wait=true", self.collection_url(collection));
        let response = self
            .client
            .put(&url)
            .json(&upsert_req)
            .send()
            .await
            .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::Upsert(error_text));
        }

        Ok(())
    }

    async fn do_search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let url = format!("{}/points/search", self.collection_url(collection));
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| VectorStoreError::Search(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(VectorStoreError::MissingCollection(collection.to_string()));
        }
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::Search(error_text));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::Search(format!("Invalid Qdrant response: {}", e)))?;

        Ok(parsed
            .result
            .into_iter()
            .map(|hit| ScoredPoint {
                id: match hit.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
                score: hit.score,
                payload: hit.payload.unwrap_or_default(),
            })
            .collect())
    }

    async fn do_count(&self, collection: &str) -> Result<usize, VectorStoreError> {
        let url = format!("{}/points/count", self.collection_url(collection));
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "exact": true }))
            .send()
            .await
            .map_err(|e| VectorStoreError::Search(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(VectorStoreError::MissingCollection(collection.to_string()));
        }
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::Search(error_text));
        }

        let parsed: CountResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::Search(format!("Invalid Qdrant response: {}", e)))?;
        Ok(parsed.result.count)
    }
}

impl VectorStore for QdrantStore {
    fn ping(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(self.do_ping())
    }

    fn recreate_collection<'a>(
        &'a self,
        collection: &'a str,
        vector_size: usize,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(self.do_recreate(collection, vector_size))
    }

    fn delete_collection<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(self.do_delete(collection))
    }

    fn upsert<'a>(
        &'a self,
        collection: &'a str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(self.do_upsert(collection, points))
    }

    fn search<'a>(
        &'a self,
        collection: &'a str,
        vector: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ScoredPoint>, VectorStoreError>> {
        Box::pin(self.do_search(collection, vector, limit))
    }

    fn count<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<usize, VectorStoreError>> {
        Box::pin(self.do_count(collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let store = QdrantStore::new("http://localhost:6333/".into(), Duration::from_secs(5)).unwrap();
        assert_eq!(store.collection_url("policy"), "http://localhost:6333/collections/policy");
    }

    #[tokio::test]
    async fn ping_fails_fast_when_unreachable() {
        let store = QdrantStore::new("http://127.0.0.1:1".into(), Duration::from_secs(2)).unwrap();
        let err = store.ping().await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Connection(_)));
    }
}
