//! Slack relay integration tests
//!
//! Events go through the router in-process; the process endpoint and the
//! Slack Web API are a local axum server recording what it receives.
//!
//! Author: hephaex@gmail.com

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use image::RgbImage;
use ragkit_api::{create_router, slack::SlackRelay, state::AppState};
use ragkit_core::{config::AppConfig, SlackConfig};
use ragkit_ocr::{OcrEngine, OcrResult};
use serde_json::{json, Value};
use tower::ServiceExt;

struct NoopEngine;

#[async_trait]
impl OcrEngine for NoopEngine {
    async fn transcribe(&self, _image: &RgbImage) -> ragkit_ocr::Result<OcrResult> {
        Ok(OcrResult::new("", "noop"))
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "noop"
    }
}

// =============================================================================
// Recording upstream
// =============================================================================

#[derive(Debug, Clone)]
struct Call {
    path: String,
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct Upstream {
    calls: Arc<Mutex<Vec<Call>>>,
    process_status: Option<StatusCode>,
    slack_ok: bool,
}

impl Upstream {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

async fn record(
    State(upstream): State<Upstream>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let path = uri.path().to_string();
    upstream.calls.lock().unwrap().push(Call {
        path: path.clone(),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    if path == "/process" {
        let status = upstream.process_status.unwrap_or(StatusCode::OK);
        return (status, Json(json!({"status": "accepted"}))).into_response();
    }

    if upstream.slack_ok {
        Json(json!({"ok": true})).into_response()
    } else {
        Json(json!({"ok": false, "error": "channel_not_found"})).into_response()
    }
}

async fn spawn_upstream(upstream: Upstream) -> String {
    let app = Router::new()
        .route("/process", post(record))
        .route("/api/chat.postMessage", post(record))
        .with_state(upstream);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn upstream(process_status: Option<StatusCode>, slack_ok: bool) -> Upstream {
    Upstream {
        calls: Arc::default(),
        process_status,
        slack_ok,
    }
}

async fn relay_app(upstream: &Upstream) -> (Router, Arc<AppState>) {
    let base = spawn_upstream(upstream.clone()).await;
    let config = SlackConfig {
        bot_token: Some("xoxb-test".to_string()),
        process_url: Some(format!("{base}/process")),
        api_base_url: format!("{base}/api"),
        ..Default::default()
    };
    let relay = SlackRelay::from_config(&config).unwrap().unwrap();
    let state = Arc::new(AppState::new(AppConfig::default(), Arc::new(NoopEngine)).with_slack(relay));
    (create_router(state.clone()), state)
}

fn app_without_relay() -> Router {
    create_router(Arc::new(AppState::new(
        AppConfig::default(),
        Arc::new(NoopEngine),
    )))
}

fn event_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/slack/events")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn mention(text: &str, channel: &str) -> Value {
    json!({
        "token": "verification-token",
        "team_id": "T061EG9R6",
        "type": "event_callback",
        "event": {
            "type": "app_mention",
            "user": "U061F7AUR",
            "text": text,
            "channel": channel,
        },
    })
}

// =============================================================================
// Handshake
// =============================================================================

#[tokio::test]
async fn test_url_verification_echoes_challenge() {
    let request = event_request(json!({
        "token": "verification-token",
        "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P",
        "type": "url_verification",
    }));

    let response = app_without_relay().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        json,
        json!({"challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"})
    );
}

// =============================================================================
// Mentions
// =============================================================================

#[tokio::test]
async fn test_mention_is_forwarded_and_confirmed() {
    let upstream = upstream(None, true);
    let (app, state) = relay_app(&upstream).await;

    let response = app
        .oneshot(event_request(mention(
            "<@U0LAN0Z89> which Pokemon are electric type? ",
            "C0LAN2Q65",
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let calls = upstream.calls();
    assert_eq!(calls.len(), 2);

    assert_eq!(calls[0].path, "/process");
    assert_eq!(
        calls[0].body,
        json!({
            "slack_event_text": "which Pokemon are electric type?",
            "slack_channel_id": "C0LAN2Q65",
        })
    );

    assert_eq!(calls[1].path, "/api/chat.postMessage");
    assert_eq!(calls[1].authorization.as_deref(), Some("Bearer xoxb-test"));
    assert_eq!(calls[1].body["channel"], "C0LAN2Q65");
    assert!(calls[1].body["text"]
        .as_str()
        .unwrap()
        .ends_with("which Pokemon are electric type?"));

    assert_eq!(state.relayed_mention_count(), 1);
}

#[tokio::test]
async fn test_event_without_type_counts_as_mention() {
    let upstream = upstream(None, true);
    let (app, _) = relay_app(&upstream).await;

    let request = event_request(json!({
        "type": "event_callback",
        "event": {"text": "<@U0LAN0Z89> hello", "channel": "C1"},
    }));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let calls = upstream.calls();
    assert_eq!(calls[0].body["slack_event_text"], "hello");
}

#[tokio::test]
async fn test_other_events_are_acknowledged_only() {
    let upstream = upstream(None, true);
    let (app, state) = relay_app(&upstream).await;

    let request = event_request(json!({
        "type": "event_callback",
        "event": {"type": "message", "text": "just chatting", "channel": "C1"},
    }));
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = event_request(json!({"type": "app_rate_limited", "minute_rate_limited": 1}));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(upstream.calls().is_empty());
    assert_eq!(state.relayed_mention_count(), 0);
}

// =============================================================================
// Failures still answer 200
// =============================================================================

#[tokio::test]
async fn test_process_failure_skips_confirmation() {
    let upstream = upstream(Some(StatusCode::INTERNAL_SERVER_ERROR), true);
    let (app, state) = relay_app(&upstream).await;

    let response = app
        .oneshot(event_request(mention("<@U0LAN0Z89> hi", "C1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let calls = upstream.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/process");
    assert_eq!(state.relayed_mention_count(), 0);
}

#[tokio::test]
async fn test_slack_api_error_is_not_counted() {
    let upstream = upstream(None, false);
    let (app, state) = relay_app(&upstream).await;

    let response = app
        .oneshot(event_request(mention("<@U0LAN0Z89> hi", "C404")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(upstream.calls().len(), 2);
    assert_eq!(state.relayed_mention_count(), 0);
}

#[tokio::test]
async fn test_mention_without_relay_is_acknowledged() {
    let response = app_without_relay()
        .oneshot(event_request(mention("<@U0LAN0Z89> hi", "C1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
