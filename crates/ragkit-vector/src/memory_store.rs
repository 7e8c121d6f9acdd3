//! In-memory vector store
//!
//! Brute-force nearest-neighbor search over a `HashMap` behind a
//! `tokio::sync::RwLock`. Used for local runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use ragkit_core::{rank_matches, IndexMetric, QueryMatch, RagkitError, Result, VectorRecord};
use tokio::sync::RwLock;

use crate::{IndexSpec, VectorStore};

/// In-memory vector store keyed by record id
#[derive(Debug)]
pub struct MemoryStore {
    spec: IndexSpec,
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl MemoryStore {
    pub fn new(spec: IndexSpec) -> Self {
        Self {
            spec,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Stored record by id
    pub async fn get(&self, id: &str) -> Option<VectorRecord> {
        self.records.read().await.get(id).cloned()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.spec.dimension {
            return Err(RagkitError::vector_store(
                "memory",
                format!(
                    "Vector dimension {} does not match index dimension {}",
                    vector.len(),
                    self.spec.dimension
                ),
            ));
        }
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Higher is closer for every metric
fn score(metric: IndexMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        IndexMetric::Cosine => cosine_similarity(a, b),
        IndexMetric::DotProduct => dot_product(a, b),
        IndexMetric::Euclidean => {
            let distance: f32 = a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt();
            1.0 / (1.0 + distance)
        }
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn create_index_if_absent(&self) -> Result<()> {
        tracing::debug!(index = %self.spec.name, "In-memory index ready");
        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        for record in records {
            self.check_dimension(&record.values)?;
        }

        let mut store = self.records.write().await;
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>> {
        self.check_dimension(vector)?;

        let store = self.records.read().await;
        let matches = store
            .values()
            .map(|record| {
                let metadata = if include_metadata {
                    record.metadata.clone()
                } else {
                    Default::default()
                };
                QueryMatch::new(
                    record.id.clone(),
                    score(self.spec.metric, &record.values, vector),
                    metadata,
                )
            })
            .collect();

        Ok(rank_matches(matches, top_k))
    }

    fn index(&self) -> &IndexSpec {
        &self.spec
    }

    fn name(&self) -> &str {
        "memory"
    }
}
