//! ragkit Core - Domain models, errors, and shared types
//!
//! This crate defines the core abstractions used throughout ragkit:
//! - Vector records and query matches exchanged with vector stores
//! - Embedding purposes and index metrics
//! - Common error types
//! - Storage key sanitization
//! - Configuration management

pub mod config;
pub mod sanitize;

pub use config::{
    AppConfig, ConfigError, EmbeddingConfig, EmbeddingProvider, OcrConfig, OcrEngineKind,
    PipelineConfig, SlackConfig, VectorStoreConfig, VectorStoreProvider,
};
pub use sanitize::sanitize_id;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for ragkit operations
#[derive(Error, Debug)]
pub enum RagkitError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError { provider: String, message: String },

    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError { backend: String, message: String },

    /// The upstream service refused the call because of quota or request rate
    #[error("Rate limited by {service}: {message}")]
    RateLimited { service: String, message: String },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RagkitError {
    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn vector_store(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::VectorStoreError {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn rate_limited(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RateLimited {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether this error should trigger the rate-limit cooldown.
    ///
    /// `RateLimited` is the structured signal. Other variants fall back to
    /// scanning the message for "quota" or "rate", which is how untyped
    /// upstream errors have been classified so far.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::EmbeddingError { message, .. } | Self::VectorStoreError { message, .. } => {
                mentions_rate_limit(message)
            }
            other => mentions_rate_limit(&other.to_string()),
        }
    }
}

impl From<ConfigError> for RagkitError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

/// Case-insensitive check for "quota" or "rate" in an error message
pub fn mentions_rate_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("quota") || lower.contains("rate")
}

pub type Result<T> = std::result::Result<T, RagkitError>;

// ============================================================================
// Embedding and Index Types
// ============================================================================

/// What an embedding will be used for.
///
/// Retrieval models embed stored passages and search queries differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingPurpose {
    Document,
    Query,
}

impl std::fmt::Display for EmbeddingPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Query => write!(f, "query"),
        }
    }
}

/// Similarity metric of a vector index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMetric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

impl std::fmt::Display for IndexMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::Euclidean => write!(f, "euclidean"),
            Self::DotProduct => write!(f, "dotproduct"),
        }
    }
}

// ============================================================================
// Vector Records
// ============================================================================

/// Provenance stored next to every vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Document id as derived from the file name (unsanitized)
    pub doc_id: String,

    /// Raw chunk text
    pub chunk: String,

    /// Position of the chunk within its document
    pub chunk_index: u32,
}

/// A record written to the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// `{sanitized_doc_id}_{chunk_index}`
    pub id: String,

    /// Embedding values
    pub values: Vec<f32>,

    /// Provenance metadata
    pub metadata: ChunkMetadata,
}

impl VectorRecord {
    /// Build the record for one chunk of a document
    pub fn for_chunk(
        clean_doc_id: &str,
        doc_id: impl Into<String>,
        chunk_index: u32,
        chunk: impl Into<String>,
        values: Vec<f32>,
    ) -> Self {
        Self {
            id: record_id(clean_doc_id, chunk_index),
            values,
            metadata: ChunkMetadata {
                doc_id: doc_id.into(),
                chunk: chunk.into(),
                chunk_index,
            },
        }
    }
}

/// Storage key of a chunk
pub fn record_id(clean_doc_id: &str, chunk_index: u32) -> String {
    format!("{clean_doc_id}_{chunk_index}")
}

/// One nearest-neighbor hit, highest score first in a result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Record id
    pub id: String,

    /// Similarity score (higher is better)
    pub score: f32,

    /// Source document id
    pub doc_id: String,

    /// Stored chunk text
    pub chunk_text: String,

    /// Chunk position within the document
    pub chunk_index: u32,
}

impl QueryMatch {
    pub fn new(id: impl Into<String>, score: f32, metadata: ChunkMetadata) -> Self {
        Self {
            id: id.into(),
            score,
            doc_id: metadata.doc_id,
            chunk_text: metadata.chunk,
            chunk_index: metadata.chunk_index,
        }
    }

    /// First `max_chars` characters of the chunk, for display
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.chunk_text.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.chunk_text[..idx],
            None => &self.chunk_text,
        }
    }
}

/// Sort matches by descending score and keep at most `top_k`
pub fn rank_matches(mut matches: Vec<QueryMatch>, top_k: usize) -> Vec<QueryMatch> {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(top_k);
    matches
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_format() {
        let record = VectorRecord::for_chunk("Lv_50_Pok_mon", "Lv.50 Pokémon", 7, "text", vec![0.1]);
        assert_eq!(record.id, "Lv_50_Pok_mon_7");
        assert_eq!(record.metadata.doc_id, "Lv.50 Pokémon");
        assert_eq!(record.metadata.chunk_index, 7);
    }

    #[test]
    fn test_metadata_wire_names() {
        let metadata = ChunkMetadata {
            doc_id: "pikachu".to_string(),
            chunk: "Pikachu is electric.".to_string(),
            chunk_index: 0,
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["doc_id"], "pikachu");
        assert_eq!(json["chunk"], "Pikachu is electric.");
        assert_eq!(json["chunk_index"], 0);
    }

    #[test]
    fn test_rate_limit_classification() {
        assert!(RagkitError::rate_limited("pinecone", "slow down").is_rate_limited());
        assert!(RagkitError::vector_store("pinecone", "Quota exceeded").is_rate_limited());
        assert!(RagkitError::embedding("gemini", "RATE LIMIT reached").is_rate_limited());
        assert!(!RagkitError::vector_store("pinecone", "connection reset").is_rate_limited());
        assert!(!RagkitError::NotFound("index".to_string()).is_rate_limited());
    }

    #[test]
    fn test_rank_matches_orders_and_truncates() {
        let metadata = |i: u32| ChunkMetadata {
            doc_id: "doc".to_string(),
            chunk: format!("chunk {i}"),
            chunk_index: i,
        };
        let matches = vec![
            QueryMatch::new("doc_0", 0.2, metadata(0)),
            QueryMatch::new("doc_1", 0.9, metadata(1)),
            QueryMatch::new("doc_2", 0.5, metadata(2)),
        ];

        let ranked = rank_matches(matches, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "doc_1");
        assert_eq!(ranked[1].id, "doc_2");
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let hit = QueryMatch::new(
            "doc_0",
            1.0,
            ChunkMetadata {
                doc_id: "doc".to_string(),
                chunk: "Pokémon evolve".to_string(),
                chunk_index: 0,
            },
        );
        assert_eq!(hit.preview(4), "Poké");
        assert_eq!(hit.preview(100), "Pokémon evolve");
    }
}
