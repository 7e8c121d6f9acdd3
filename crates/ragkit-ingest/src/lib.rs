//! ragkit Ingest - Batch embedding pipeline and query path
//!
//! This crate drives the document flow:
//! - Read a document and split it into overlapping sentence chunks
//! - Embed chunks in small, throttled batches
//! - Upsert each batch into the vector store, backing off on rate limits
//! - Answer similarity queries against the stored chunks
//!
//! Everything runs sequentially. Failures are isolated per chunk, per batch
//! and per document, so one bad input never stops the run.
//!
//! Author: hephaex@gmail.com

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use ragkit_core::{
    rank_matches, sanitize_id, EmbeddingPurpose, PipelineConfig, QueryMatch, RagkitError, Result,
    VectorRecord,
};
use ragkit_parser::{chunk_text, document_id_from_path, ChunkConfig, ParserRegistry, TextChunk};
use ragkit_vector::{EmbeddingClient, VectorStore};

pub mod report;

pub use report::IngestReport;

// ============================================================================
// Pipeline
// ============================================================================

/// Outcome of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchOutcome {
    Stored,
    Empty,
    RateLimited,
    Failed,
}

/// Embedding and storage pipeline over one embedding client and one store
pub struct IngestPipeline {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    parsers: ParserRegistry,
    config: PipelineConfig,
}

impl IngestPipeline {
    /// Create a pipeline with the default document parsers
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            parsers: ParserRegistry::with_defaults(),
            config,
        }
    }

    fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig::new(self.config.max_chunk_length, self.config.chunk_overlap)
    }

    /// Create the vector index unless it exists and wait for it to be ready
    pub async fn ensure_index(&self) -> Result<()> {
        let index = self.store.index();
        if index.dimension != self.embedder.dimension() {
            return Err(RagkitError::ValidationError(format!(
                "Index dimension {} does not match embedding dimension {}",
                index.dimension,
                self.embedder.dimension()
            )));
        }

        tracing::info!(
            backend = self.store.name(),
            index = %index.name,
            dimension = index.dimension,
            metric = %index.metric,
            "Ensuring vector index"
        );
        self.store.create_index_if_absent().await
    }

    /// Read, chunk, embed and store one document.
    ///
    /// Never fails: an error that aborts the document is recorded in the report.
    pub async fn ingest_document(&self, path: &Path, doc_id: &str) -> IngestReport {
        let start = Instant::now();
        let mut report = IngestReport::new(doc_id);

        if let Err(e) = self.try_ingest_document(path, &mut report).await {
            tracing::error!(doc_id, error = %e, "Error processing document");
            report.error = Some(e.to_string());
        }

        report.elapsed_ms = start.elapsed().as_millis() as u64;
        report
    }

    async fn try_ingest_document(&self, path: &Path, report: &mut IngestReport) -> Result<()> {
        let doc_id = report.doc_id.clone();
        if sanitize_id(&doc_id).is_empty() {
            return Err(RagkitError::ValidationError(format!(
                "Document id {doc_id:?} has no usable characters"
            )));
        }

        let text = self.parsers.read_text(path);
        if text.is_empty() {
            tracing::warn!(doc_id = %doc_id, path = %path.display(), "No content found");
            return Ok(());
        }

        let chunks = chunk_text(&text, &self.chunk_config());
        tracing::info!(doc_id = %doc_id, chunks = chunks.len(), "Processing document");

        self.upsert_chunks(&doc_id, &chunks, report).await
    }

    /// Embed `chunks` in batches and upsert every batch that produced records.
    ///
    /// Only an unusable document id is an error; chunk and batch failures
    /// are logged and counted in `report`.
    pub async fn upsert_chunks(
        &self,
        doc_id: &str,
        chunks: &[TextChunk],
        report: &mut IngestReport,
    ) -> Result<()> {
        let clean_id = sanitize_id(doc_id);
        if clean_id.is_empty() {
            return Err(RagkitError::ValidationError(format!(
                "Document id {doc_id:?} has no usable characters"
            )));
        }

        report.chunks += chunks.len();
        let batch_size = self.config.batch_size.max(1);

        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            match self.process_batch(doc_id, &clean_id, batch, report).await {
                BatchOutcome::Stored | BatchOutcome::Empty => {
                    tracing::debug!(doc_id, batch = batch_no, "Batch done");
                    tokio::time::sleep(self.config.batch_delay()).await;
                }
                BatchOutcome::RateLimited => {
                    report.batches_rate_limited += 1;
                    tracing::warn!(
                        doc_id,
                        batch = batch_no,
                        cooldown_secs = self.config.rate_limit_cooldown().as_secs(),
                        "Rate limit hit, cooling down"
                    );
                    tokio::time::sleep(self.config.rate_limit_cooldown()).await;
                }
                BatchOutcome::Failed => {
                    report.batches_failed += 1;
                }
            }
        }

        Ok(())
    }

    async fn process_batch(
        &self,
        doc_id: &str,
        clean_id: &str,
        batch: &[TextChunk],
        report: &mut IngestReport,
    ) -> BatchOutcome {
        let mut records = Vec::with_capacity(batch.len());

        for chunk in batch {
            match self
                .embedder
                .embed(&chunk.content, EmbeddingPurpose::Document)
                .await
            {
                Ok(values) => {
                    records.push(VectorRecord::for_chunk(
                        clean_id,
                        doc_id,
                        chunk.index,
                        chunk.content.clone(),
                        values,
                    ));
                    tokio::time::sleep(self.config.embed_delay()).await;
                }
                Err(e) => {
                    report.chunks_failed += 1;
                    tracing::error!(
                        doc_id,
                        chunk_index = chunk.index,
                        error = %e,
                        "Error embedding chunk"
                    );
                }
            }
        }

        if records.is_empty() {
            return BatchOutcome::Empty;
        }

        match self.store.upsert(&records).await {
            Ok(written) => {
                report.records_stored += written;
                report.batches_upserted += 1;
                tracing::info!(doc_id, records = written, "Upserted batch");
                BatchOutcome::Stored
            }
            Err(e) if e.is_rate_limited() => {
                tracing::debug!(doc_id, error = %e, "Upsert rate limited");
                BatchOutcome::RateLimited
            }
            Err(e) => {
                tracing::error!(doc_id, error = %e, "Error processing batch");
                BatchOutcome::Failed
            }
        }
    }

    /// Ingest every matching file in `dir`, one document at a time
    pub async fn ingest_directory(&self, dir: &Path) -> Result<Vec<IngestReport>> {
        let files = self.scan_directory(dir)?;
        tracing::info!(dir = %dir.display(), documents = files.len(), "Ingesting directory");

        let mut reports = Vec::with_capacity(files.len());
        for path in files {
            let Some(doc_id) = document_id_from_path(&path) else {
                tracing::warn!(path = %path.display(), "Skipping file without a name");
                continue;
            };
            tracing::info!(doc_id = %doc_id, "Processing");
            reports.push(self.ingest_document(&path, &doc_id).await);
        }

        Ok(reports)
    }

    /// Files in `dir` with a configured extension, sorted by name
    pub fn scan_directory(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir).map_err(|e| RagkitError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| RagkitError::Io {
                    path: dir.to_path_buf(),
                    source: e,
                })?
                .path();
            if path.is_file() && self.has_configured_extension(&path) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    fn has_configured_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.config
                    .extensions
                    .iter()
                    .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Embed `text` as a query and return the nearest chunks.
    ///
    /// Failures are logged and reported as `None`.
    pub async fn query_similar_chunks(&self, text: &str, top_k: usize) -> Option<Vec<QueryMatch>> {
        match self.try_query(text, top_k).await {
            Ok(matches) => Some(matches),
            Err(e) => {
                tracing::error!(error = %e, "Error querying");
                None
            }
        }
    }

    async fn try_query(&self, text: &str, top_k: usize) -> Result<Vec<QueryMatch>> {
        let vector = self.embedder.embed(text, EmbeddingPurpose::Query).await?;
        let matches = self.store.query(&vector, top_k, true).await?;
        tracing::debug!(matches = matches.len(), top_k, "Query returned");
        Ok(rank_matches(matches, top_k))
    }
}

// ============================================================================
// Tests
// ============================================================================
