pub mod chunk;
pub mod chunker;
pub mod extractor;
pub mod upload;

pub use chunk::Chunk;
pub use chunker::{Chunker, ChunkerConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use extractor::{DocumentKind, TextExtractor};
pub use upload::{collection_name, is_allowed, secure_filename, ALLOWED_EXTENSIONS};

use anyhow::Result;
use std::path::Path;

/// A stored document after text extraction.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub filename: String,
    pub collection: String,
    pub text: String,
}

impl LoadedDocument {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Main ingestion step: check the extension, then extract the text.
///
/// Unsupported extensions are rejected here, before the extractor runs. An
/// extraction failure is not an error; it yields an empty document.
pub async fn load_document(path: &Path) -> Result<LoadedDocument> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Path has no file name: {:?}", path))?
        .to_string();

    if !is_allowed(&filename) {
        anyhow::bail!("Unsupported file format: {}", filename);
    }

    let text = TextExtractor::extract(path).await;

    Ok(LoadedDocument {
        collection: collection_name(&filename),
        filename,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unsupported_extension_before_extraction() {
        let result = load_document(Path::new("/nonexistent/notes.txt")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unreadable_document_loads_as_empty() {
        let doc = load_document(Path::new("/nonexistent/policy.pdf")).await.unwrap();
        assert_eq!(doc.collection, "policy");
        assert!(doc.is_empty());
    }
}
