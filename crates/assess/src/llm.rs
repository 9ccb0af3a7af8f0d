use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Coarse class of a failed LLM call, reported per control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ModelNotFound,
    PermissionDenied,
    QuotaExhausted,
    InvalidResponse,
    Provider,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("model '{model}' was not found by the provider")]
    ModelNotFound { model: String },

    #[error("permission denied by the provider: {0}")]
    PermissionDenied(String),

    #[error("provider quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("structured output parse failed: {0}")]
    StructuredParse(String),

    #[error("empty response from provider")]
    EmptyResponse,
}

impl LlmError {
    /// Map a non-success HTTP status onto the provider error taxonomy.
    pub fn from_status(status: u16, body: String, model: &str) -> Self {
        match status {
            404 => Self::ModelNotFound {
                model: model.to_string(),
            },
            401 | 403 => Self::PermissionDenied(body),
            429 => Self::QuotaExhausted(body),
            _ => Self::Status { status, body },
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ModelNotFound { .. } => FailureKind::ModelNotFound,
            Self::PermissionDenied(_) => FailureKind::PermissionDenied,
            Self::QuotaExhausted(_) => FailureKind::QuotaExhausted,
            Self::StructuredParse(_) | Self::EmptyResponse => FailureKind::InvalidResponse,
            Self::Status { .. } | Self::Http(_) => FailureKind::Provider,
        }
    }

    /// Failures that will repeat for every further call in the same run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::ModelNotFound | FailureKind::PermissionDenied | FailureKind::QuotaExhausted
        )
    }

    /// Message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::ModelNotFound { model } => format!(
                "The AI model '{model}' was not found. Check the configured model name and that it is installed on the provider."
            ),
            Self::PermissionDenied(_) => {
                "The AI provider denied access. Check the configured credentials and their permissions.".to_string()
            }
            Self::QuotaExhausted(_) => {
                "The AI provider quota has been exhausted. Try again later or raise the quota.".to_string()
            }
            Self::StructuredParse(detail) => {
                format!("The AI response did not match the expected format: {detail}")
            }
            Self::EmptyResponse => "The AI provider returned an empty response.".to_string(),
            Self::Status { .. } | Self::Http(_) => format!("Unexpected AI provider error: {self}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    /// JSON schema constraining the output, if any.
    pub format: Option<serde_json::Value>,
}

impl GenerationRequest {
    pub fn text(prompt: String, temperature: f32) -> Self {
        Self {
            prompt,
            temperature,
            format: None,
        }
    }

    pub fn structured(prompt: String, temperature: f32, schema: serde_json::Value) -> Self {
        Self {
            prompt,
            temperature,
            format: Some(schema),
        }
    }
}

pub trait LanguageModel: Send + Sync {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String, LlmError>>;

    fn model(&self) -> &str;

    /// Reachability probe; providers without one report healthy.
    fn ping(&self) -> BoxFuture<'_, Result<(), LlmError>> {
        Box::pin(async { Ok(()) })
    }
}

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a serde_json::Value>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(
        base_url: String,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            client,
        })
    }

    async fn do_ping(&self) -> Result<(), LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.authorized(self.client.get(&url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), body, &self.model));
        }
        Ok(())
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn do_generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);

        let body = OllamaRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            format: request.format.as_ref(),
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        let response = self.authorized(self.client.post(&url)).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), body, &self.model));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        if ollama_response.response.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(ollama_response.response)
    }
}

impl LanguageModel for OllamaClient {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String, LlmError>> {
        Box::pin(self.do_generate(request))
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), LlmError>> {
        Box::pin(self.do_ping())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_failure_classes() {
        assert_eq!(LlmError::from_status(404, String::new(), "llama3").kind(), FailureKind::ModelNotFound);
        assert_eq!(LlmError::from_status(401, String::new(), "llama3").kind(), FailureKind::PermissionDenied);
        assert_eq!(LlmError::from_status(403, String::new(), "llama3").kind(), FailureKind::PermissionDenied);
        assert_eq!(LlmError::from_status(429, String::new(), "llama3").kind(), FailureKind::QuotaExhausted);
        assert_eq!(LlmError::from_status(500, String::new(), "llama3").kind(), FailureKind::Provider);
    }

    #[test]
    fn only_provider_wide_failures_are_fatal() {
        assert!(LlmError::from_status(404, String::new(), "m").is_fatal());
        assert!(LlmError::from_status(429, String::new(), "m").is_fatal());
        assert!(!LlmError::from_status(503, String::new(), "m").is_fatal());
        assert!(!LlmError::StructuredParse("bad".into()).is_fatal());
    }

    #[test]
    fn user_messages_are_distinct_per_class() {
        let messages = [
            LlmError::from_status(404, String::new(), "llama3").user_message(),
            LlmError::from_status(403, String::new(), "llama3").user_message(),
            LlmError::from_status(429, String::new(), "llama3").user_message(),
            LlmError::from_status(500, "boom".into(), "llama3").user_message(),
        ];
        assert!(messages[0].contains("llama3"));
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn request_serializes_schema_and_temperature() {
        let schema = serde_json::json!({"type": "object"});
        let body = OllamaRequest {
            model: "llama3",
            prompt: "hi",
            stream: false,
            format: Some(&schema),
            options: OllamaOptions { temperature: 0.5 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["format"]["type"], "object");
        assert_eq!(json["options"]["temperature"], 0.5);

        let plain = OllamaRequest { format: None, ..body };
        assert!(serde_json::to_value(&plain).unwrap().get("format").is_none());
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_provider_failure() {
        let client = OllamaClient::new(
            "http://127.0.0.1:1".into(),
            "llama3".into(),
            None,
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client
            .generate(GenerationRequest::text("hello".into(), 0.0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Provider);
    }
}
