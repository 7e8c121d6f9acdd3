//! ragkit API - OCR HTTP service
//!
//! Exposes `POST /transcribe`, which takes a multipart `image` upload and
//! returns the recognized text, `POST /slack/events` for the Slack mention
//! relay, and `GET /health`.
//!
//! Author: hephaex@gmail.com

pub mod error;
pub mod handlers;
pub mod slack;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_body_size;

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/transcribe", post(handlers::transcribe::transcribe))
        .route("/slack/events", post(handlers::slack::slack_events))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
