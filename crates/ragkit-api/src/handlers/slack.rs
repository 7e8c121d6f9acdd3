//! Slack Events API handler
//!
//! Author: hephaex@gmail.com

use crate::slack::SlackEnvelope;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Answer to the `url_verification` handshake
#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub challenge: String,
}

/// `POST /slack/events`: acknowledge every event, relaying bot mentions
///
/// Relay failures are logged only; Slack retries anything that is not a 200.
pub async fn slack_events(
    State(state): State<Arc<AppState>>,
    Json(envelope): Json<SlackEnvelope>,
) -> Response {
    let event = match envelope {
        SlackEnvelope::UrlVerification { challenge } => {
            return Json(ChallengeResponse { challenge }).into_response();
        }
        SlackEnvelope::EventCallback { event } if event.is_mention() => event,
        SlackEnvelope::EventCallback { event } => {
            tracing::debug!(kind = ?event.kind, "Ignoring Slack event");
            return StatusCode::OK.into_response();
        }
        SlackEnvelope::Other => return StatusCode::OK.into_response(),
    };

    match &state.slack {
        Some(relay) => match relay.relay(&event).await {
            Ok(text) => {
                let count = state.record_relayed_mention();
                tracing::info!(channel = ?event.channel, chars = text.chars().count(), relayed = count, "Mention relayed");
            }
            Err(e) => tracing::error!(channel = ?event.channel, error = %e, "Slack relay failed"),
        },
        None => tracing::warn!("Slack mention received but no process URL is configured"),
    }

    StatusCode::OK.into_response()
}
