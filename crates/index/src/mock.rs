//! Test-only deterministic embedder.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embeddings::{BoxFuture, Embedder, EmbeddingError};

/// Bag-of-words embedder: each lower-cased word is hashed into one of
/// `dimension` buckets. Texts sharing words score as similar.
#[derive(Debug)]
pub struct MockEmbedder {
    pub dimension: usize,
    pub fail: bool,
    calls: AtomicUsize,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            dimension: 64,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MockEmbedder {
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % self.dimension as u64) as usize] += 1.0;
        }
        vector
    }
}

impl Embedder for MockEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let result = if self.fail {
            Err(EmbeddingError::Status {
                status: 500,
                body: "mock embedding error".into(),
            })
        } else {
            Ok(self.vectorize(text))
        };
        Box::pin(async move { result })
    }

    fn model(&self) -> &str {
        "mock"
    }
}
