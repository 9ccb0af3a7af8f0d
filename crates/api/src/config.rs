use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Env var naming the TOML config file.
pub const CONFIG_ENV: &str = "COMPLIANCE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "compliance.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub embeddings: EmbeddingsConfig,
    pub vector_store: VectorStoreConfig,
    pub chunking: ChunkingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub upload_dir: PathBuf,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperatures: Temperatures,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Temperatures {
    pub assessment: f32,
    pub chat: f32,
    pub draft: f32,
    pub risks: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Qdrant,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    pub url: String,
    pub top_k: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            upload_dir: PathBuf::from("uploads"),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            api_key: None,
            timeout_secs: 120,
            temperatures: Temperatures::default(),
        }
    }
}

impl Default for Temperatures {
    fn default() -> Self {
        Self {
            assessment: assess::ASSESSMENT_TEMPERATURE,
            chat: query::CHAT_TEMPERATURE,
            draft: assess::advisor::DRAFT_TEMPERATURE,
            risks: assess::advisor::RISK_TEMPERATURE,
        }
    }
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: index::DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Qdrant,
            url: "http://localhost:6333".to_string(),
            top_k: index::DEFAULT_TOP_K,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: ingest::DEFAULT_CHUNK_SIZE,
            chunk_overlap: ingest::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Read the file named by `COMPLIANCE_CONFIG` (or `compliance.toml`),
    /// then apply `COMPLIANCE_*` environment overrides and validate.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = Self::load(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults are used when `path` does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Apply overrides looked up through `var`, normally `std::env::var`.
    /// A value that does not parse is an error.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = var("COMPLIANCE_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = var("COMPLIANCE_UPLOAD_DIR") {
            self.server.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = var("COMPLIANCE_DATA_DIR") {
            self.server.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("COMPLIANCE_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = var("COMPLIANCE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = var("COMPLIANCE_LLM_API_KEY") {
            self.llm.api_key = Some(v).filter(|k| !k.trim().is_empty());
        }
        if let Some(v) = var("COMPLIANCE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_override("COMPLIANCE_LLM_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("COMPLIANCE_EMBEDDINGS_BASE_URL") {
            self.embeddings.base_url = v;
        }
        if let Some(v) = var("COMPLIANCE_EMBEDDINGS_MODEL") {
            self.embeddings.model = v;
        }
        if let Some(v) = var("COMPLIANCE_VECTOR_BACKEND") {
            self.vector_store.backend = serde_json::from_value(serde_json::Value::String(v.to_lowercase()))
                .with_context(|| format!("invalid COMPLIANCE_VECTOR_BACKEND value: {v}"))?;
        }
        if let Some(v) = var("COMPLIANCE_QDRANT_URL") {
            self.vector_store.url = v;
        }
        if let Some(v) = var("COMPLIANCE_TOP_K") {
            self.vector_store.top_k = parse_override("COMPLIANCE_TOP_K", &v)?;
        }
        if let Some(v) = var("COMPLIANCE_CHUNK_SIZE") {
            self.chunking.chunk_size = parse_override("COMPLIANCE_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = var("COMPLIANCE_CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_override("COMPLIANCE_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = var("COMPLIANCE_LOG_JSON") {
            self.logging.json = parse_override("COMPLIANCE_LOG_JSON", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.llm.base_url.trim().is_empty() {
            bail!("llm.base_url must not be empty");
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if self.embeddings.base_url.trim().is_empty() {
            bail!("embeddings.base_url must not be empty");
        }
        if self.vector_store.backend == VectorBackend::Qdrant && self.vector_store.url.trim().is_empty() {
            bail!("vector_store.url must not be empty for the qdrant backend");
        }
        if self.vector_store.top_k == 0 {
            bail!("vector_store.top_k must be at least 1");
        }
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be greater than zero");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }
        Ok(())
    }
}

fn parse_override<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid {key} value: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 150);
        assert_eq!(config.vector_store.top_k, 5);
        assert_eq!(config.embeddings.model, "all-minilm");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:3000");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compliance.toml");
        std::fs::write(
            &path,
            "[llm]\nmodel = \"mistral\"\n\n[vector_store]\nbackend = \"memory\"\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.vector_store.backend, VectorBackend::Memory);
        assert_eq!(config.chunking.chunk_size, 1000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compliance.toml");
        std::fs::write(&path, "[llm\nmodel = ").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn env_overrides_win() {
        let vars = HashMap::from([
            ("COMPLIANCE_LLM_MODEL", "gemma2"),
            ("COMPLIANCE_VECTOR_BACKEND", "Memory"),
            ("COMPLIANCE_CHUNK_SIZE", "500"),
            ("COMPLIANCE_TOP_K", "8"),
            ("COMPLIANCE_LLM_API_KEY", ""),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.llm.model, "gemma2");
        assert_eq!(config.vector_store.backend, VectorBackend::Memory);
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.vector_store.top_k, 8);
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn unparsable_env_override_is_an_error() {
        for (key, value) in [
            ("COMPLIANCE_CHUNK_SIZE", "1k"),
            ("COMPLIANCE_VECTOR_BACKEND", "qdrnat"),
            ("COMPLIANCE_TOP_K", "not-a-number"),
            ("COMPLIANCE_LOG_JSON", "yes"),
        ] {
            let mut config = AppConfig::default();
            let err = config
                .apply_overrides(|k| (k == key).then(|| value.to_string()))
                .unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
        }
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut config = AppConfig::default();
        config.llm.base_url = "  ".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.chunking.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.vector_store.backend = VectorBackend::Memory;
        config.vector_store.url.clear();
        config.validate().unwrap();
    }
}
