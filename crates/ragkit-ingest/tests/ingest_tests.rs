//! End-to-end ingest tests over DOCX files and the in-memory store

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use docx_rs::{Docx, Paragraph, Run};
use ragkit_core::{EmbeddingPurpose, PipelineConfig, Result};
use ragkit_ingest::IngestPipeline;
use ragkit_vector::{EmbeddingClient, IndexSpec, MemoryStore, VectorStore};

/// Letter-frequency embedding; similar wording lands close together
struct LetterEmbedding;

#[async_trait]
impl EmbeddingClient for LetterEmbedding {
    async fn embed(&self, text: &str, _purpose: EmbeddingPurpose) -> Result<Vec<f32>> {
        let mut counts = vec![0.0f32; 26];
        for c in text.to_ascii_lowercase().chars() {
            if c.is_ascii_lowercase() {
                counts[(c as u8 - b'a') as usize] += 1.0;
            }
        }
        Ok(counts)
    }

    fn dimension(&self) -> usize {
        26
    }

    fn name(&self) -> &str {
        "letters"
    }
}

fn write_docx(dir: &Path, name: &str, paragraphs: &[&str]) {
    let file = std::fs::File::create(dir.join(name)).unwrap();
    let mut docx = Docx::new();
    for text in paragraphs {
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)));
    }
    docx.build().pack(file).unwrap();
}

fn setup() -> (IngestPipeline, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(IndexSpec::new("pokemon-test", 26)));
    let config = PipelineConfig {
        max_chunk_length: 60,
        chunk_overlap: 1,
        batch_size: 2,
        ..Default::default()
    }
    .without_delays();
    let pipeline = IngestPipeline::new(Arc::new(LetterEmbedding), store.clone(), config);
    (pipeline, store)
}

#[tokio::test]
async fn test_ingest_directory_stores_every_document() {
    let dir = tempfile::tempdir().unwrap();
    write_docx(
        dir.path(),
        "Pikachu.docx",
        &[
            "Pikachu is an Electric type Pokemon.",
            "It stores electricity in its cheeks. It releases thunderbolts.",
        ],
    );
    write_docx(dir.path(), "Bulbasaur.docx", &["Bulbasaur is a Grass type Pokemon."]);
    std::fs::write(dir.path().join("notes.txt"), "not a document").unwrap();

    let (pipeline, store) = setup();
    pipeline.ensure_index().await.unwrap();
    let reports = pipeline.ingest_directory(dir.path()).await.unwrap();

    // sorted by file name, .txt ignored
    let ids: Vec<&str> = reports.iter().map(|r| r.doc_id.as_str()).collect();
    assert_eq!(ids, vec!["Bulbasaur", "Pikachu"]);
    assert!(reports.iter().all(|r| r.is_complete()));

    let pikachu = &reports[1];
    assert!(pikachu.chunks > 1);
    assert_eq!(
        store.len().await,
        reports.iter().map(|r| r.records_stored).sum::<usize>()
    );

    let first = store.get("Pikachu_0").await.unwrap();
    assert_eq!(first.metadata.doc_id, "Pikachu");
    assert!(first.metadata.chunk.starts_with("Pikachu is an Electric type Pokemon."));
}

#[tokio::test]
async fn test_query_finds_ingested_chunk() {
    let dir = tempfile::tempdir().unwrap();
    write_docx(dir.path(), "Pikachu.docx", &["Pikachu is an Electric type Pokemon."]);
    write_docx(dir.path(), "Zubat.docx", &["Zubat flies in dark caves."]);

    let (pipeline, _) = setup();
    pipeline.ingest_directory(dir.path()).await.unwrap();

    let matches = pipeline
        .query_similar_chunks("What are electric type Pokemon?", 5)
        .await
        .unwrap();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].doc_id, "Pikachu");
    assert!(matches[0].score >= matches[1].score);
    assert_eq!(matches[0].preview(7), "Pikachu");
}

#[tokio::test]
async fn test_reingest_overwrites_records() {
    let dir = tempfile::tempdir().unwrap();
    write_docx(dir.path(), "Eevee.docx", &["Eevee has many evolutions."]);

    let (pipeline, store) = setup();
    pipeline.ingest_directory(dir.path()).await.unwrap();
    pipeline.ingest_directory(dir.path()).await.unwrap();

    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_unreadable_document_does_not_stop_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Broken.docx"), b"not a zip").unwrap();
    write_docx(dir.path(), "Mew.docx", &["Mew is a Psychic type Pokemon."]);

    let (pipeline, store) = setup();
    let reports = pipeline.ingest_directory(dir.path()).await.unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].doc_id, "Broken");
    assert_eq!(reports[0].chunks, 0);
    assert!(reports[1].is_complete());
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_missing_directory_is_error() {
    let (pipeline, _) = setup();
    assert!(pipeline
        .ingest_directory(Path::new("/nonexistent/pokedoc"))
        .await
        .is_err());
}
