use serde::{Deserialize, Serialize};
use std::sync::Arc;

use assess::{GenerationRequest, LanguageModel, LlmError};
use index::{DocumentIndex, IndexError, RetrievedChunk, DEFAULT_TOP_K};

pub const CHAT_TEMPERATURE: f32 = 0.1;

/// Reply the model is told to give when the context has no answer.
pub const NOT_FOUND_ANSWER: &str = "The information is not found in the provided document.";

pub const CHAT_FAILURE: &str = "An error occurred while processing your question. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("collection name must not be empty")]
    EmptyCollection,

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] IndexError),

    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<RetrievedChunk>,
}

/// Answers questions about one indexed document from its retrieved chunks.
pub struct DocumentChat {
    index: Arc<DocumentIndex>,
    llm: Arc<dyn LanguageModel>,
    top_k: usize,
    temperature: f32,
}

impl DocumentChat {
    pub fn new(index: Arc<DocumentIndex>, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            index,
            llm,
            top_k: DEFAULT_TOP_K,
            temperature: CHAT_TEMPERATURE,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub async fn try_answer(&self, question: &str, collection: &str) -> Result<ChatAnswer, QueryError> {
        if question.trim().is_empty() {
            return Err(QueryError::EmptyQuestion);
        }
        if collection.trim().is_empty() {
            return Err(QueryError::EmptyCollection);
        }

        let sources = self.index.retrieve(collection, question, self.top_k).await?;
        tracing::debug!(collection, chunks = sources.len(), "Context retrieved");

        let prompt = build_chat_prompt(&build_context(&sources), question);
        let answer = self
            .llm
            .generate(GenerationRequest::text(prompt, self.temperature))
            .await?;

        Ok(ChatAnswer { answer, sources })
    }

    /// Like [`try_answer`](Self::try_answer) but never fails: errors are
    /// logged and replaced by [`CHAT_FAILURE`].
    pub async fn answer(&self, question: &str, collection: &str) -> String {
        match self.try_answer(question, collection).await {
            Ok(reply) => reply.answer,
            Err(e) => {
                tracing::error!(collection, error = %e, "Question answering failed");
                CHAT_FAILURE.to_string()
            }
        }
    }
}

fn build_context(chunks: &[RetrievedChunk]) -> String {
    let mut context = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        context.push_str(&format!("[Chunk {}] {}\n\n", i + 1, chunk.text));
    }
    context.trim_end().to_string()
}

fn build_chat_prompt(context: &str, question: &str) -> String {
    format!(
        r#"You are an expert assistant on the ISO 27001 standard. Your task is to answer the user's question based solely on the provided context.
If the context does not contain the answer, say "{}".
Be clear and concise.

CONTEXT:
{}

QUESTION:
{}

ANSWER:"#,
        NOT_FOUND_ANSWER, context, question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess::mock::MockModel;
    use index::mock::MockEmbedder;
    use index::InMemoryVectorStore;
    use ingest::Chunker;

    async fn indexed() -> Arc<DocumentIndex> {
        let index = DocumentIndex::new(
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(MockEmbedder::with_dimension(4096)),
            Chunker::default(),
        );
        let text = [
            "backup ".repeat(150),
            "All laptops use full disk encryption with keys held by IT.".to_string(),
            "visitor ".repeat(150),
        ]
        .join("\n\n");
        index.index_document(&text, "policy").await.unwrap();
        Arc::new(index)
    }

    #[tokio::test]
    async fn answer_is_grounded_in_retrieved_context() {
        let llm = Arc::new(MockModel::replying("  Laptops use full disk encryption.\n"));
        let chat = DocumentChat::new(indexed().await, llm.clone());

        let reply = chat.try_answer("Which encryption do laptops use?", "policy").await.unwrap();
        assert_eq!(reply.answer, "  Laptops use full disk encryption.\n");
        assert!(!reply.sources.is_empty());

        let request = &llm.requests()[0];
        assert_eq!(request.temperature, CHAT_TEMPERATURE);
        assert!(request.prompt.contains("full disk encryption"));
        assert!(request.prompt.contains("Which encryption do laptops use?"));
        assert!(request.prompt.contains(NOT_FOUND_ANSWER));
    }

    #[tokio::test]
    async fn blank_inputs_never_reach_the_model() {
        let llm = Arc::new(MockModel::replying("x"));
        let chat = DocumentChat::new(indexed().await, llm.clone());

        assert!(matches!(chat.try_answer("  ", "policy").await, Err(QueryError::EmptyQuestion)));
        assert!(matches!(chat.try_answer("why?", "").await, Err(QueryError::EmptyCollection)));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_collection_yields_fixed_error_string() {
        let llm = Arc::new(MockModel::replying("x"));
        let chat = DocumentChat::new(indexed().await, llm.clone());

        assert_eq!(chat.answer("anything?", "missing").await, CHAT_FAILURE);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn provider_failure_yields_fixed_error_string() {
        let llm = Arc::new(MockModel::failing(|| LlmError::PermissionDenied("bad key".into())));
        let chat = DocumentChat::new(indexed().await, llm);

        assert_eq!(chat.answer("anything?", "policy").await, CHAT_FAILURE);
    }

    #[test]
    fn context_numbers_chunks() {
        let chunks = vec![
            RetrievedChunk { chunk_index: 3, text: "alpha".into(), score: 0.9 },
            RetrievedChunk { chunk_index: 0, text: "beta".into(), score: 0.5 },
        ];
        assert_eq!(build_context(&chunks), "[Chunk 1] alpha\n\n[Chunk 2] beta");
    }
}
