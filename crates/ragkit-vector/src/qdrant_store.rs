//! Qdrant implementation for vector storage
//!
//! Provides collection management and vector operations
//! for document chunk embeddings.
//!
//! Author: hephaex@gmail.com

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use ragkit_core::{
    ChunkMetadata, IndexMetric, QueryMatch, RagkitError, Result, VectorRecord, VectorStoreConfig,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{IndexSpec, VectorStore};

/// Qdrant vector store implementation
pub struct QdrantStore {
    client: Qdrant,
    spec: IndexSpec,
}

impl QdrantStore {
    /// Create a new Qdrant client; no connection is made until the first call
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.qdrant_url)
            .timeout(config.timeout())
            .build()
            .map_err(|e| RagkitError::vector_store("qdrant", format!("Client setup failed: {e}")))?;

        Ok(Self {
            client,
            spec: IndexSpec::from_config(config),
        })
    }
}

/// Qdrant point ids must be integers or UUIDs; record ids map to a stable UUIDv5
fn point_id(record_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string()
}

fn distance(metric: IndexMetric) -> Distance {
    match metric {
        IndexMetric::Cosine => Distance::Cosine,
        IndexMetric::Euclidean => Distance::Euclid,
        IndexMetric::DotProduct => Distance::Dot,
    }
}

/// Payload stored with each vector
#[derive(Debug, Clone, Serialize)]
struct VectorPayload<'a> {
    record_id: &'a str,
    doc_id: &'a str,
    chunk: &'a str,
    chunk_index: u32,
}

fn payload_map(record: &VectorRecord) -> HashMap<String, qdrant_client::qdrant::Value> {
    let payload = VectorPayload {
        record_id: &record.id,
        doc_id: &record.metadata.doc_id,
        chunk: &record.metadata.chunk,
        chunk_index: record.metadata.chunk_index,
    };

    serde_json::to_value(&payload)
        .unwrap_or_default()
        .as_object()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.into()))
        .collect()
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn create_index_if_absent(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(self.spec.name.clone())
            .await
            .map_err(|e| {
                RagkitError::vector_store("qdrant", format!("Failed to list collections: {e}"))
            })?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.spec.name).vectors_config(
                        VectorParamsBuilder::new(
                            self.spec.dimension as u64,
                            distance(self.spec.metric),
                        ),
                    ),
                )
                .await
                .map_err(|e| {
                    RagkitError::vector_store("qdrant", format!("Failed to create collection: {e}"))
                })?;
            tracing::info!(collection = %self.spec.name, "Created Qdrant collection");
        }

        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let points: Vec<PointStruct> = records
            .iter()
            .map(|record| {
                PointStruct::new(
                    point_id(&record.id),
                    record.values.clone(),
                    payload_map(record),
                )
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.spec.name, points).wait(true))
            .await
            .map_err(|e| RagkitError::vector_store("qdrant", format!("Failed to upsert vectors: {e}")))?;

        Ok(records.len())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>> {
        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.spec.name, vector.to_vec(), top_k as u64)
                    // record_id lives in the payload, so it is always fetched
                    .with_payload(true),
            )
            .await
            .map_err(|e| RagkitError::vector_store("qdrant", format!("Vector search failed: {e}")))?;

        let matches = results
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                let text = |key: &str| {
                    payload
                        .get(key)
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                        .unwrap_or_default()
                };

                let metadata = if include_metadata {
                    ChunkMetadata {
                        doc_id: text("doc_id"),
                        chunk: text("chunk"),
                        chunk_index: payload
                            .get("chunk_index")
                            .and_then(|v| v.as_integer())
                            .unwrap_or_default() as u32,
                    }
                } else {
                    ChunkMetadata::default()
                };

                QueryMatch::new(text("record_id"), point.score, metadata)
            })
            .collect();

        Ok(matches)
    }

    fn index(&self) -> &IndexSpec {
        &self.spec
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
