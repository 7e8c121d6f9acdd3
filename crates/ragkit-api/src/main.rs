//! ragkit OCR API Server
//!
//! Serves handwritten text recognition and the Slack mention relay over HTTP.
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use ragkit_api::{create_router, slack::SlackRelay, state::AppState};
use ragkit_core::config::AppConfig;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration: optional file from RAGKIT_CONFIG, then environment
    let config_path = std::env::var("RAGKIT_CONFIG").ok();
    let config = AppConfig::load(config_path.as_deref().map(std::path::Path::new))
        .context("Failed to load configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "ragkit={0},ragkit_api={0},ragkit_ocr={0},tower_http=debug",
            config.logging.level
        ))
    });
    if config.logging.json_format {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let engine = ragkit_ocr::create_ocr_engine(&config.ocr).context("Failed to create OCR engine")?;
    if !engine.is_available().await {
        tracing::warn!(engine = engine.name(), "OCR engine not reachable yet");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let engine_name = engine.name().to_string();

    let slack = SlackRelay::from_config(&config.slack).context("Failed to create Slack relay")?;

    // Create application state
    let mut state = AppState::new(config, Arc::from(engine));
    match slack {
        Some(relay) => state = state.with_slack(relay),
        None => tracing::info!("Slack relay disabled (SLACK_PROCESS_URL not set)"),
    }
    let state = Arc::new(state);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(engine = %engine_name, "OCR API server starting on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
