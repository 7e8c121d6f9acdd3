//! Pinecone implementation for vector storage
//!
//! Talks to the Pinecone REST API: the control plane manages serverless
//! indexes, the per-index data plane host takes upserts and queries.
//!
//! Author: hephaex@gmail.com

use std::time::Duration;

use async_trait::async_trait;
use ragkit_core::{ChunkMetadata, QueryMatch, RagkitError, Result, VectorRecord, VectorStoreConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::{check_response, http_client, IndexSpec, VectorStore};

const API_VERSION: &str = "2024-07";

/// Pinecone vector store implementation
pub struct PineconeStore {
    client: Client,
    api_key: String,
    control_plane_url: String,
    spec: IndexSpec,
    cloud: String,
    region: String,
    poll_interval: Duration,
    max_attempts: u32,
    host: OnceCell<String>,
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: String,
    spec: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    serverless: CloudRegion<'a>,
}

#[derive(Debug, Serialize)]
struct CloudRegion<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: Option<String>,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Debug, Deserialize)]
struct PineconeMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<ChunkMetadata>,
}

impl PineconeStore {
    /// Create from config; requires an API key
    pub fn from_config(config: &VectorStoreConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| RagkitError::ConfigError("Pinecone API key required".to_string()))?;

        Ok(Self {
            client: http_client(config.timeout())?,
            api_key: api_key.clone(),
            control_plane_url: config.control_plane_url.trim_end_matches('/').to_string(),
            spec: IndexSpec::from_config(config),
            cloud: config.cloud.clone(),
            region: config.region.clone(),
            poll_interval: config.ready_poll_interval(),
            max_attempts: config.ready_max_attempts,
            host: OnceCell::new(),
        })
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    fn failure(message: String) -> RagkitError {
        RagkitError::vector_store("pinecone", message)
    }

    fn send_error(e: reqwest::Error) -> RagkitError {
        Self::failure(format!("Request failed: {e}"))
    }

    /// Describe the index, `None` if it does not exist
    async fn describe_index(&self) -> Result<Option<IndexDescription>> {
        let url = format!("{}/indexes/{}", self.control_plane_url, self.spec.name);
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(Self::send_error)?;

        match check_response("pinecone", response, Self::failure).await {
            Ok(response) => {
                let description = response.json().await.map_err(|e| {
                    Self::failure(format!("Failed to parse index description: {e}"))
                })?;
                Ok(Some(description))
            }
            Err(RagkitError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_index(&self) -> Result<()> {
        let request = CreateIndexRequest {
            name: &self.spec.name,
            dimension: self.spec.dimension,
            metric: self.spec.metric.to_string(),
            spec: ServerlessSpec {
                serverless: CloudRegion {
                    cloud: &self.cloud,
                    region: &self.region,
                },
            },
        };

        let response = self
            .request(
                reqwest::Method::POST,
                format!("{}/indexes", self.control_plane_url),
            )
            .json(&request)
            .send()
            .await
            .map_err(Self::send_error)?;

        // 409: created concurrently by someone else
        if response.status() == reqwest::StatusCode::CONFLICT {
            tracing::debug!(index = %self.spec.name, "Index already exists");
            return Ok(());
        }

        check_response("pinecone", response, Self::failure).await?;
        tracing::info!(
            index = %self.spec.name,
            dimension = self.spec.dimension,
            metric = %self.spec.metric,
            "Created Pinecone index"
        );
        Ok(())
    }

    /// Poll the index until it reports ready; returns its data plane host
    async fn wait_until_ready(&self) -> Result<String> {
        for attempt in 1..=self.max_attempts {
            if let Some(description) = self.describe_index().await? {
                if description.status.ready {
                    return description.host.ok_or_else(|| {
                        Self::failure(format!("Index {} has no host", self.spec.name))
                    });
                }
                tracing::debug!(
                    index = %self.spec.name,
                    attempt,
                    state = %description.status.state,
                    "Waiting for index"
                );
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(Self::failure(format!(
            "Index {} not ready after {} checks",
            self.spec.name, self.max_attempts
        )))
    }

    /// Data plane host, resolved once
    async fn host(&self) -> Result<&str> {
        let host = self
            .host
            .get_or_try_init(|| async {
                match self.describe_index().await? {
                    Some(IndexDescription {
                        host: Some(host), ..
                    }) => Ok(host),
                    _ => Err(RagkitError::NotFound(format!(
                        "Pinecone index {}",
                        self.spec.name
                    ))),
                }
            })
            .await?;
        Ok(host.as_str())
    }

    fn data_plane_url(host: &str, path: &str) -> String {
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}/{path}", host.trim_end_matches('/'))
        } else {
            format!("https://{host}/{path}")
        }
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn create_index_if_absent(&self) -> Result<()> {
        if self.describe_index().await?.is_none() {
            self.create_index().await?;
        }

        let host = self.wait_until_ready().await?;
        tracing::info!(index = %self.spec.name, %host, "Index ready");
        let _ = self.host.set(host);
        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let host = self.host().await?;
        let response = self
            .request(
                reqwest::Method::POST,
                Self::data_plane_url(host, "vectors/upsert"),
            )
            .json(&UpsertRequest { vectors: records })
            .send()
            .await
            .map_err(Self::send_error)?;

        let response = check_response("pinecone", response, Self::failure).await?;
        let result: UpsertResponse = response
            .json()
            .await
            .map_err(|e| Self::failure(format!("Failed to parse upsert response: {e}")))?;

        Ok(result.upserted_count.unwrap_or(records.len()))
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>> {
        let host = self.host().await?;
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata,
            include_values: false,
        };

        let response = self
            .request(reqwest::Method::POST, Self::data_plane_url(host, "query"))
            .json(&request)
            .send()
            .await
            .map_err(Self::send_error)?;

        let response = check_response("pinecone", response, Self::failure).await?;
        let result: QueryResponse = response
            .json()
            .await
            .map_err(|e| Self::failure(format!("Failed to parse query response: {e}")))?;

        Ok(result
            .matches
            .into_iter()
            .map(|m| QueryMatch::new(m.id, m.score, m.metadata.unwrap_or_default()))
            .collect())
    }

    fn index(&self) -> &IndexSpec {
        &self.spec
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}

// ============================================================================
// Tests
// ============================================================================
