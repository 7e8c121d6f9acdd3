//! Health check handler
//!
//! Author: hephaex@gmail.com

use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub engine: String,
    pub uptime_seconds: u64,
    pub transcriptions: u64,
    pub slack_relay: bool,
    pub relayed_mentions: u64,
}

/// Liveness probe
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state.engine.name().to_string(),
        uptime_seconds: state.uptime_secs(),
        transcriptions: state.transcription_count(),
        slack_relay: state.slack.is_some(),
        relayed_mentions: state.relayed_mention_count(),
    })
}
