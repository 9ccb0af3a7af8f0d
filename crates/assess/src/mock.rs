//! Scripted language model for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::llm::{BoxFuture, GenerationRequest, LanguageModel, LlmError};

type Responder = Box<dyn Fn(&GenerationRequest) -> Result<String, LlmError> + Send + Sync>;

/// Replies are taken from the script first; once it runs dry the responder
/// answers every further request.
pub struct MockModel {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    responder: Responder,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockModel {
    /// Always replies with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::from_fn(move |_| Ok(text.clone()))
    }

    /// Always fails with the error built by `make_error`.
    pub fn failing(make_error: impl Fn() -> LlmError + Send + Sync + 'static) -> Self {
        Self::from_fn(move |_| Err(make_error()))
    }

    pub fn from_fn(
        responder: impl Fn(&GenerationRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue replies served in order before the responder takes over.
    pub fn with_script(self, replies: Vec<Result<String, LlmError>>) -> Self {
        self.script.lock().unwrap().extend(replies);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl LanguageModel for MockModel {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String, LlmError>> {
        let scripted = self.script.lock().unwrap().pop_front();
        let result = match scripted {
            Some(reply) => reply,
            None => (self.responder)(&request),
        };
        self.requests.lock().unwrap().push(request);
        Box::pin(async move { result })
    }

    fn model(&self) -> &str {
        "mock-llm"
    }
}
