//! ragkit Vector - Embedding and vector database abstraction
//!
//! Provides the two remote collaborators of the ingest pipeline: an
//! embedding client turning text into vectors and a vector store keeping
//! `(id, vector, metadata)` records for nearest-neighbor queries.

use async_trait::async_trait;
use ragkit_core::{
    IndexMetric, QueryMatch, RagkitError, Result, VectorRecord, VectorStoreConfig,
    VectorStoreProvider,
};

pub mod embedding;
pub mod memory_store;
pub mod pinecone_store;
pub mod qdrant_store;

pub use embedding::{create_embedding_client, EmbeddingClient, GeminiEmbedding, OllamaEmbedding};
pub use memory_store::MemoryStore;
pub use pinecone_store::PineconeStore;
pub use qdrant_store::QdrantStore;

/// Name, dimension and metric of a vector index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: IndexMetric,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric: IndexMetric::Cosine,
        }
    }

    pub fn with_metric(mut self, metric: IndexMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn from_config(config: &VectorStoreConfig) -> Self {
        Self::new(config.index_name.clone(), config.dimension).with_metric(config.metric)
    }
}

/// Trait for vector database operations.
///
/// A store is bound to one index; `upsert` overwrites records with the same id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the index unless it exists, and wait until it accepts writes
    async fn create_index_if_absent(&self) -> Result<()>;

    /// Insert or overwrite records; returns the number written
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize>;

    /// Nearest neighbors of `vector`, highest score first, at most `top_k`
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>>;

    /// The index this store writes to
    fn index(&self) -> &IndexSpec;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Create a vector store from config
pub fn create_vector_store(config: &VectorStoreConfig) -> Result<Box<dyn VectorStore>> {
    match config.provider {
        VectorStoreProvider::Pinecone => Ok(Box::new(PineconeStore::from_config(config)?)),
        VectorStoreProvider::Qdrant => Ok(Box::new(QdrantStore::new(config)?)),
        VectorStoreProvider::Memory => Ok(Box::new(MemoryStore::new(IndexSpec::from_config(
            config,
        )))),
    }
}

/// Map a non-success HTTP status to an error.
///
/// 429 and `RESOURCE_EXHAUSTED` bodies become `RateLimited`, 404 becomes
/// `NotFound`, anything else goes through `failure`.
pub(crate) async fn check_response(
    service: &str,
    response: reqwest::Response,
    failure: impl FnOnce(String) -> RagkitError,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        return Err(RagkitError::rate_limited(service, format!("{status}: {body}")));
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(RagkitError::NotFound(format!("{service}: {body}")));
    }
    Err(failure(format!("{status}: {body}")))
}

/// HTTP client with a request timeout
pub(crate) fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RagkitError::ConfigError(format!("Failed to build HTTP client: {e}")))
}
