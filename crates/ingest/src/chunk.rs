use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub collection: String,
    pub chunk_id: String,
    pub index: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(collection: String, index: usize, text: String) -> Self {
        // Generate stable chunk_id from content
        let chunk_id = Self::generate_chunk_id(&collection, index, &text);

        Self {
            collection,
            chunk_id,
            index,
            text,
        }
    }

    fn generate_chunk_id(collection: &str, index: usize, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(collection.as_bytes());
        hasher.update(index.to_string().as_bytes());
        hasher.update(text.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16]) // Use first 16 bytes (32 hex chars)
    }
}
