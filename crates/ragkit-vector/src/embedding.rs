//! Embedding client for generating vector representations
//!
//! Supports the Gemini and Ollama embedding APIs.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use ragkit_core::{EmbeddingConfig, EmbeddingProvider, EmbeddingPurpose, RagkitError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{check_response, http_client};

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate the embedding of `text` for the given purpose
    async fn embed(&self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Gemini Embedding Client
// ============================================================================

/// Gemini `embedContent` API client
pub struct GeminiEmbedding {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiEmbeddingRequest<'a> {
    model: String,
    content: GeminiContent<'a>,
    task_type: &'static str,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: [GeminiPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbeddingResponse {
    embedding: GeminiValues,
}

#[derive(Debug, Deserialize)]
struct GeminiValues {
    values: Vec<f32>,
}

/// Gemini task type for a purpose
fn task_type(purpose: EmbeddingPurpose) -> &'static str {
    match purpose {
        EmbeddingPurpose::Document => "RETRIEVAL_DOCUMENT",
        EmbeddingPurpose::Query => "RETRIEVAL_QUERY",
    }
}

impl GeminiEmbedding {
    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| RagkitError::ConfigError("Gemini API key required".to_string()))?;

        Ok(Self {
            client: http_client(config.timeout())?,
            api_key: api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model_name().to_string(),
            dimension: config.dimension,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:embedContent", self.base_url, self.model)
    }
}

#[async_trait]
impl EmbeddingClient for GeminiEmbedding {
    async fn embed(&self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>> {
        let request = GeminiEmbeddingRequest {
            model: format!("models/{}", self.model),
            content: GeminiContent {
                parts: [GeminiPart { text }],
            },
            task_type: task_type(purpose),
        };

        tracing::debug!(provider = "gemini", model = %self.model, %purpose, "Embedding text");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagkitError::embedding("gemini", format!("Request failed: {e}")))?;

        let response = check_response("gemini", response, |m| {
            RagkitError::embedding("gemini", m)
        })
        .await?;

        let result: GeminiEmbeddingResponse = response.json().await.map_err(|e| {
            RagkitError::embedding("gemini", format!("Failed to parse embedding response: {e}"))
        })?;

        if result.embedding.values.len() != self.dimension {
            return Err(RagkitError::embedding(
                "gemini",
                format!(
                    "Expected {} dimensions, got {}",
                    self.dimension,
                    result.embedding.values.len()
                ),
            ));
        }

        Ok(result.embedding.values)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout())?,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model_name().to_string(),
            dimension: config.dimension,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    // Ollama has no task types; both purposes embed the same way
    async fn embed(&self, text: &str, _purpose: EmbeddingPurpose) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagkitError::embedding("ollama", format!("Request failed: {e}")))?;

        let response = check_response("ollama", response, |m| {
            RagkitError::embedding("ollama", m)
        })
        .await?;

        let result: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            RagkitError::embedding("ollama", format!("Failed to parse embedding response: {e}"))
        })?;

        Ok(result.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config
pub fn create_embedding_client(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>> {
    match config.provider {
        EmbeddingProvider::Gemini => Ok(Box::new(GeminiEmbedding::from_config(config)?)),
        EmbeddingProvider::Ollama => Ok(Box::new(OllamaEmbedding::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================
