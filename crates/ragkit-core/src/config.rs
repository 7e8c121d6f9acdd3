//! ragkit Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with defaults matching the hosted services the pipeline talks to.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::IndexMetric;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Vector store configuration
    pub vector_store: VectorStoreConfig,

    /// Ingest pipeline configuration
    pub pipeline: PipelineConfig,

    /// OCR service HTTP configuration
    pub server: ServerConfig,

    /// OCR engine configuration
    pub ocr: OcrConfig,

    /// Slack event relay configuration
    pub slack: SlackConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { message, .. } => ConfigError::ParseError { path, message },
            other => other,
        })
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    /// Load from an optional file, then apply environment overrides and validate
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env_override()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Embedding
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            self.embedding.model = Some(model);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.embedding.ollama_url = url;
        }

        // Vector store
        if let Ok(provider) = std::env::var("VECTOR_STORE_PROVIDER") {
            self.vector_store.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("PINECONE_API_KEY") {
            self.vector_store.api_key = Some(key);
        }
        if let Ok(name) = std::env::var("INDEX_NAME") {
            self.vector_store.index_name = name;
        }
        if let Ok(url) = std::env::var("QDRANT_URL") {
            self.vector_store.qdrant_url = url;
        }

        // Pipeline
        if let Ok(dir) = std::env::var("DOCUMENTS_DIR") {
            self.pipeline.documents_dir = PathBuf::from(dir);
        }

        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "API_PORT".to_string(),
                value: port,
            })?;
        }

        // OCR
        if let Ok(engine) = std::env::var("OCR_ENGINE") {
            self.ocr.engine = engine.parse()?;
        }
        if let Ok(token) = std::env::var("HF_API_TOKEN") {
            self.ocr.api_token = Some(token);
        }
        if let Ok(model) = std::env::var("OCR_MODEL") {
            self.ocr.model = model;
        }
        if let Ok(path) = std::env::var("TESSERACT_PATH") {
            self.ocr.tesseract_path = Some(path);
        }

        // Slack
        if let Ok(token) = std::env::var("SLACK_BOT_TOKEN") {
            self.slack.bot_token = Some(token);
        }
        if let Ok(url) = std::env::var("SLACK_PROCESS_URL") {
            self.slack.process_url = Some(url);
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.batch_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.pipeline.max_chunk_length == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.max_chunk_length".to_string(),
                value: "0".to_string(),
            });
        }
        if self.vector_store.dimension == 0 || self.embedding.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "dimension".to_string(),
                value: "0".to_string(),
            });
        }
        if self.vector_store.dimension != self.embedding.dimension {
            return Err(ConfigError::InvalidValue {
                key: "vector_store.dimension".to_string(),
                value: format!(
                    "{} (embedding model produces {})",
                    self.vector_store.dimension, self.embedding.dimension
                ),
            });
        }
        Ok(())
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding provider to use
    pub provider: EmbeddingProvider,

    /// Gemini API key
    pub api_key: Option<String>,

    /// Gemini API base URL
    pub base_url: String,

    /// Ollama server URL
    pub ollama_url: String,

    /// Embedding model name; unset picks the provider's default model
    pub model: Option<String>,

    /// Vector dimension produced by the model
    pub dimension: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    /// Configured model, or the provider's default
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Gemini,
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            model: None,
            dimension: 768,
            timeout_secs: 60,
        }
    }
}

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Gemini,
    Ollama,
}

impl EmbeddingProvider {
    /// Model used when none is configured; both produce 768-dimensional vectors
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "text-embedding-004",
            Self::Ollama => "nomic-embed-text",
        }
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Vector store backend
    pub provider: VectorStoreProvider,

    /// Pinecone API key
    pub api_key: Option<String>,

    /// Pinecone control plane URL
    pub control_plane_url: String,

    /// Index (or collection) name
    pub index_name: String,

    /// Serverless cloud for new Pinecone indexes
    pub cloud: String,

    /// Serverless region for new Pinecone indexes
    pub region: String,

    /// Similarity metric
    pub metric: IndexMetric,

    /// Vector dimension (must match embedding model)
    pub dimension: usize,

    /// Qdrant gRPC URL
    pub qdrant_url: String,

    /// Delay between index readiness checks in milliseconds
    pub ready_poll_ms: u64,

    /// Readiness checks before giving up
    pub ready_max_attempts: u32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl VectorStoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms)
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: VectorStoreProvider::Pinecone,
            api_key: None,
            control_plane_url: "https://api.pinecone.io".to_string(),
            index_name: "pokemon-gemini".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            metric: IndexMetric::Cosine,
            dimension: 768, // Gemini text-embedding-004
            qdrant_url: "http://localhost:6334".to_string(),
            ready_poll_ms: 1000,
            ready_max_attempts: 120,
            timeout_secs: 60,
        }
    }
}

/// Supported vector store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreProvider {
    Pinecone,
    Qdrant,
    Memory,
}

impl std::str::FromStr for VectorStoreProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pinecone" => Ok(Self::Pinecone),
            "qdrant" => Ok(Self::Qdrant),
            "memory" | "inmemory" => Ok(Self::Memory),
            _ => Err(ConfigError::InvalidValue {
                key: "VECTOR_STORE_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Ingest pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory scanned for documents
    pub documents_dir: PathBuf,

    /// File extensions picked up by the directory scan
    pub extensions: Vec<String>,

    /// Maximum chunk length in characters
    pub max_chunk_length: usize,

    /// Overlap between consecutive chunks, in sentences
    pub chunk_overlap: usize,

    /// Chunks embedded per upsert call
    pub batch_size: usize,

    /// Pause after each embedding request in milliseconds
    pub embed_delay_ms: u64,

    /// Pause after each upserted batch in milliseconds
    pub batch_delay_ms: u64,

    /// Cooldown after a rate-limited upsert in seconds
    pub rate_limit_cooldown_secs: u64,

    /// Default number of query results
    pub query_top_k: usize,
}

impl PipelineConfig {
    pub fn embed_delay(&self) -> Duration {
        Duration::from_millis(self.embed_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    /// Same settings with every pause set to zero
    pub fn without_delays(mut self) -> Self {
        self.embed_delay_ms = 0;
        self.batch_delay_ms = 0;
        self.rate_limit_cooldown_secs = 0;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("pokedoc"),
            extensions: vec!["docx".to_string()],
            max_chunk_length: 500,
            chunk_overlap: 50,
            batch_size: 5,
            embed_delay_ms: 500,
            batch_delay_ms: 2000,
            rate_limit_cooldown_secs: 60,
            query_top_k: 5,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// OCR engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Engine used for transcription
    pub engine: OcrEngineKind,

    /// Pretrained model identifier
    pub model: String,

    /// Inference API base URL
    pub inference_url: String,

    /// Inference API token
    pub api_token: Option<String>,

    /// Tesseract language code(s)
    pub tesseract_language: String,

    /// Tesseract page segmentation mode (7 treats the image as one text line)
    pub tesseract_psm: Option<u8>,

    /// Tesseract OCR engine mode
    pub tesseract_oem: Option<u8>,

    /// Path to the tesseract executable, if not on PATH
    pub tesseract_path: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OcrConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: OcrEngineKind::HfInference,
            model: "microsoft/trocr-base-handwritten".to_string(),
            inference_url: "https://api-inference.huggingface.co/models".to_string(),
            api_token: None,
            tesseract_language: "eng".to_string(),
            tesseract_psm: None,
            tesseract_oem: None,
            tesseract_path: None,
            timeout_secs: 120,
        }
    }
}

/// Supported OCR engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrEngineKind {
    HfInference,
    Tesseract,
}

impl std::str::FromStr for OcrEngineKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hf_inference" | "huggingface" | "trocr" => Ok(Self::HfInference),
            "tesseract" => Ok(Self::Tesseract),
            _ => Err(ConfigError::InvalidValue {
                key: "OCR_ENGINE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Slack event relay configuration
///
/// Mentions of the bot are forwarded to `process_url`; the relay stays off
/// until that URL is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Bot token used for `chat.postMessage`
    pub bot_token: Option<String>,

    /// Process endpoint receiving forwarded mentions
    pub process_url: Option<String>,

    /// Slack Web API base URL
    pub api_base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl SlackConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            process_url: None,
            api_base_url: "https://slack.com/api".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.vector_store.dimension, 768);
        assert_eq!(config.pipeline.batch_size, 5);
        assert_eq!(config.pipeline.max_chunk_length, 500);
        assert_eq!(config.pipeline.chunk_overlap, 50);
        assert_eq!(config.pipeline.embed_delay(), Duration::from_millis(500));
        assert_eq!(config.pipeline.rate_limit_cooldown(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(
            "gemini".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Gemini
        );
        assert_eq!(
            "Pinecone".parse::<VectorStoreProvider>().unwrap(),
            VectorStoreProvider::Pinecone
        );
        assert_eq!(
            "tesseract".parse::<OcrEngineKind>().unwrap(),
            OcrEngineKind::Tesseract
        );
        assert!("invalid".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [pipeline]
            batch_size = 10
            extensions = ["docx", "txt"]

            [vector_store]
            provider = "memory"
            metric = "dotproduct"
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.batch_size, 10);
        assert_eq!(config.pipeline.chunk_overlap, 50);
        assert_eq!(config.pipeline.extensions, vec!["docx", "txt"]);
        assert_eq!(config.vector_store.provider, VectorStoreProvider::Memory);
        assert_eq!(config.vector_store.metric, IndexMetric::DotProduct);
        assert_eq!(config.vector_store.index_name, "pokemon-gemini");
    }

    #[test]
    fn test_embedding_model_follows_provider() {
        let mut embedding = EmbeddingConfig::default();
        assert_eq!(embedding.model_name(), "text-embedding-004");

        embedding.provider = EmbeddingProvider::Ollama;
        assert_eq!(embedding.model_name(), "nomic-embed-text");

        embedding.model = Some("mxbai-embed-large".to_string());
        assert_eq!(embedding.model_name(), "mxbai-embed-large");
    }

    #[test]
    fn test_toml_model_override() {
        let config = AppConfig::from_toml_str(
            r#"
            [embedding]
            provider = "ollama"
            "#,
        )
        .unwrap();
        assert_eq!(config.embedding.model, None);
        assert_eq!(config.embedding.model_name(), "nomic-embed-text");
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = AppConfig::default();
        config.pipeline.batch_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_dimension_mismatch() {
        let mut config = AppConfig::default();
        config.vector_store.dimension = 1536;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_slack_defaults_off() {
        let config = AppConfig::default();
        assert!(config.slack.process_url.is_none());
        assert_eq!(config.slack.api_base_url, "https://slack.com/api");

        let config = AppConfig::from_toml_str(
            r#"
            [slack]
            process_url = "https://cai.example.test/process"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.slack.process_url.as_deref(),
            Some("https://cai.example.test/process")
        );
        assert_eq!(config.slack.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_without_delays() {
        let pipeline = PipelineConfig::default().without_delays();
        assert_eq!(pipeline.embed_delay(), Duration::ZERO);
        assert_eq!(pipeline.batch_delay(), Duration::ZERO);
        assert_eq!(pipeline.rate_limit_cooldown(), Duration::ZERO);
        assert_eq!(pipeline.batch_size, 5);
    }
}
