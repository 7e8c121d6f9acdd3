//! Slack event relay
//!
//! Bot mentions received through the Slack Events API are stripped of
//! `<@U…>`/`<#C…>` references and forwarded to a process endpoint as
//! `{"slack_event_text", "slack_channel_id"}`. A confirmation is then posted
//! back to the channel with `chat.postMessage`.

use once_cell::sync::Lazy;
use ragkit_core::SlackConfig;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

static REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

// ============================================================================
// Errors
// ============================================================================

/// Slack relay errors
#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    #[error("Request to {target} failed: {message}")]
    Request {
        target: &'static str,
        message: String,
    },

    #[error("{target} returned HTTP {status}: {message}")]
    Upstream {
        target: &'static str,
        status: u16,
        message: String,
    },

    #[error("Slack API error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, SlackError>;

// ============================================================================
// Events API payloads
// ============================================================================

/// Outer envelope of an Events API request
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEnvelope {
    /// Handshake sent when the request URL is registered
    UrlVerification { challenge: String },
    /// A subscribed event
    EventCallback { event: SlackEvent },
    #[serde(other)]
    Other,
}

/// Inner event of an `event_callback`
#[derive(Debug, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: String,
    pub channel: Option<String>,
}

impl SlackEvent {
    /// Mentions of the bot; an event without a type counts as one
    pub fn is_mention(&self) -> bool {
        matches!(self.kind.as_deref(), None | Some("") | Some("app_mention"))
    }
}

/// Body forwarded to the process endpoint
#[derive(Debug, Serialize)]
pub struct ForwardPayload<'a> {
    pub slack_event_text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack_channel_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Remove user, channel and link references, then trim
pub fn strip_references(text: &str) -> String {
    REFERENCE.replace_all(text, "").trim().to_string()
}

// ============================================================================
// Relay
// ============================================================================

/// Forwards bot mentions and confirms them in Slack
pub struct SlackRelay {
    client: Client,
    process_url: String,
    bot_token: Option<String>,
    api_base_url: String,
}

impl SlackRelay {
    /// Create from config; `None` while no process URL is configured
    pub fn from_config(config: &SlackConfig) -> Result<Option<Self>> {
        let Some(process_url) = config.process_url.clone().filter(|u| !u.is_empty()) else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SlackError::Client(e.to_string()))?;

        Ok(Some(Self {
            client,
            process_url,
            bot_token: config.bot_token.clone().filter(|t| !t.is_empty()),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }))
    }

    /// Forward a mention and post the confirmation; returns the forwarded text
    pub async fn relay(&self, event: &SlackEvent) -> Result<String> {
        let text = strip_references(&event.text);
        let channel = event.channel.as_deref();

        self.forward(&text, channel).await?;

        match channel {
            Some(channel) => self.confirm(channel, &text).await?,
            None => tracing::warn!("Mention without channel, no confirmation posted"),
        }

        Ok(text)
    }

    async fn forward(&self, text: &str, channel: Option<&str>) -> Result<()> {
        let payload = ForwardPayload {
            slack_event_text: text,
            slack_channel_id: channel,
        };

        let response = self
            .client
            .post(&self.process_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SlackError::Request {
                target: "process endpoint",
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SlackError::Upstream {
                target: "process endpoint",
                status: status.as_u16(),
                message: body,
            });
        }

        tracing::debug!(response = %body, "Process endpoint accepted mention");
        Ok(())
    }

    async fn confirm(&self, channel: &str, text: &str) -> Result<()> {
        let Some(token) = &self.bot_token else {
            tracing::debug!("No bot token, skipping confirmation");
            return Ok(());
        };

        let message = PostMessage {
            channel,
            text: format!("Message received and sent for processing: {text}"),
        };

        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_base_url))
            .bearer_auth(token)
            .json(&message)
            .send()
            .await
            .map_err(|e| SlackError::Request {
                target: "chat.postMessage",
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlackError::Upstream {
                target: "chat.postMessage",
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        // Slack reports most failures as 200 with `ok: false`
        let result: ApiResponse = response
            .json()
            .await
            .map_err(|e| SlackError::Api(format!("Unexpected response: {e}")))?;
        if !result.ok {
            return Err(SlackError::Api(
                result.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_references() {
        assert_eq!(
            strip_references("<@U024BE7LH> what is <#C1234|general> about? "),
            "what is  about?"
        );
        assert_eq!(strip_references("  plain text "), "plain text");
        assert_eq!(strip_references("<@U024BE7LH>"), "");
    }

    #[test]
    fn test_parse_url_verification() {
        let envelope: SlackEnvelope = serde_json::from_str(
            r#"{"token": "t", "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P", "type": "url_verification"}"#,
        )
        .unwrap();
        assert!(matches!(
            envelope,
            SlackEnvelope::UrlVerification { challenge } if challenge.starts_with("3eZbrw")
        ));
    }

    #[test]
    fn test_parse_event_callback() {
        let envelope: SlackEnvelope = serde_json::from_str(
            r#"{
                "type": "event_callback",
                "team_id": "T061EG9R6",
                "event": {"type": "app_mention", "user": "U061F7AUR", "text": "<@U0LAN0Z89> hi", "channel": "C0LAN2Q65"}
            }"#,
        )
        .unwrap();
        match envelope {
            SlackEnvelope::EventCallback { event } => {
                assert!(event.is_mention());
                assert_eq!(event.channel.as_deref(), Some("C0LAN2Q65"));
                assert_eq!(strip_references(&event.text), "hi");
            }
            other => panic!("expected event callback, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_envelope_type() {
        let envelope: SlackEnvelope =
            serde_json::from_str(r#"{"type": "app_rate_limited", "minute_rate_limited": 1}"#)
                .unwrap();
        assert!(matches!(envelope, SlackEnvelope::Other));
    }

    #[test]
    fn test_is_mention() {
        let event = |kind: Option<&str>| SlackEvent {
            kind: kind.map(str::to_string),
            text: String::new(),
            channel: None,
        };
        assert!(event(None).is_mention());
        assert!(event(Some("app_mention")).is_mention());
        assert!(!event(Some("message")).is_mention());
        assert!(!event(Some("reaction_added")).is_mention());
    }

    #[test]
    fn test_payload_omits_missing_channel() {
        let json = serde_json::to_value(ForwardPayload {
            slack_event_text: "hi",
            slack_channel_id: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"slack_event_text": "hi"}));
    }

    #[test]
    fn test_relay_off_without_process_url() {
        assert!(SlackRelay::from_config(&SlackConfig::default())
            .unwrap()
            .is_none());

        let config = SlackConfig {
            process_url: Some("http://localhost:9/process".to_string()),
            bot_token: Some(String::new()),
            api_base_url: "https://slack.example.test/api/".to_string(),
            ..Default::default()
        };
        let relay = SlackRelay::from_config(&config).unwrap().unwrap();
        assert!(relay.bot_token.is_none());
        assert_eq!(relay.api_base_url, "https://slack.example.test/api");
    }
}
