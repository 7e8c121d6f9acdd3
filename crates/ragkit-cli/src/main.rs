//! ragkit CLI - Command-line interface
//!
//! Usage:
//!   ragkit init-index
//!   ragkit ingest [--dir <path>]
//!   ragkit query <question> [--top-k <n>]
//!   ragkit run [--question <question>]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ragkit_core::config::{AppConfig, LoggingConfig};
use ragkit_core::QueryMatch;
use ragkit_ingest::IngestPipeline;
use ragkit_vector::{create_embedding_client, create_vector_store};
use tracing_subscriber::EnvFilter;

const SAMPLE_QUESTION: &str = "What are electric type Pokemon?";
const PREVIEW_CHARS: usize = 100;

#[derive(Parser)]
#[command(name = "ragkit")]
#[command(about = "Document embedding pipeline and similarity search")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vector index if needed and wait until it is ready
    InitIndex,
    /// Embed and store every document in a directory
    Ingest {
        /// Document directory (defaults to pipeline.documents_dir)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Find the chunks most similar to a question
    Query {
        /// Question to ask
        question: String,
        /// Number of matches (defaults to pipeline.query_top_k)
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Ensure the index, ingest the document directory, then run a sample query
    Run {
        #[arg(long, default_value = SAMPLE_QUESTION)]
        question: String,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json_format {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_pipeline(config: &AppConfig) -> anyhow::Result<IngestPipeline> {
    let embedder = create_embedding_client(&config.embedding)
        .context("Failed to create embedding client")?;
    let store =
        create_vector_store(&config.vector_store).context("Failed to create vector store")?;

    Ok(IngestPipeline::new(
        Arc::from(embedder),
        Arc::from(store),
        config.pipeline.clone(),
    ))
}

async fn ingest(pipeline: &IngestPipeline, dir: PathBuf) -> anyhow::Result<()> {
    let reports = pipeline.ingest_directory(&dir).await?;
    for report in &reports {
        println!("{report}");
    }

    let stored: usize = reports.iter().map(|r| r.records_stored).sum();
    println!(
        "Processed {} documents, {} records stored",
        reports.len(),
        stored
    );
    Ok(())
}

fn format_match(hit: &QueryMatch) -> String {
    format!(
        "Score: {:.4}\nDocument: {}\nText: {}...",
        hit.score,
        hit.doc_id,
        hit.preview(PREVIEW_CHARS)
    )
}

async fn query(pipeline: &IngestPipeline, question: &str, top_k: usize) -> anyhow::Result<()> {
    let Some(matches) = pipeline.query_similar_chunks(question, top_k).await else {
        anyhow::bail!("Query failed, see log for details");
    };

    println!("\nResults for: {question}");
    for hit in &matches {
        println!("\n{}", format_match(hit));
    }
    if matches.is_empty() {
        println!("No matches");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let pipeline = build_pipeline(&config)?;

    match cli.command {
        Commands::InitIndex => {
            pipeline.ensure_index().await?;
            println!("Index {} is ready", config.vector_store.index_name);
        }
        Commands::Ingest { dir } => {
            pipeline.ensure_index().await?;
            let dir = dir.unwrap_or_else(|| config.pipeline.documents_dir.clone());
            ingest(&pipeline, dir).await?;
        }
        Commands::Query { question, top_k } => {
            let top_k = top_k.unwrap_or(config.pipeline.query_top_k);
            query(&pipeline, &question, top_k).await?;
        }
        Commands::Run { question } => {
            pipeline.ensure_index().await?;
            ingest(&pipeline, config.pipeline.documents_dir.clone()).await?;
            query(&pipeline, &question, config.pipeline.query_top_k).await?;
        }
    }

    Ok(())
}
