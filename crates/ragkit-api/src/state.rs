//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::slack::SlackRelay;
use ragkit_core::config::AppConfig;
use ragkit_ocr::OcrEngine;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Engine used for transcription
    pub engine: Arc<dyn OcrEngine>,
    /// Server start time
    pub start_time: Instant,
    /// Transcription requests served
    pub transcriptions: AtomicU64,
    /// Relay for Slack mentions, when configured
    pub slack: Option<SlackRelay>,
    /// Slack mentions relayed
    pub relayed_mentions: AtomicU64,
}

impl AppState {
    /// Create new application state
    pub fn new(config: AppConfig, engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            config,
            engine,
            start_time: Instant::now(),
            transcriptions: AtomicU64::new(0),
            slack: None,
            relayed_mentions: AtomicU64::new(0),
        }
    }

    /// Enable the Slack relay
    pub fn with_slack(mut self, relay: SlackRelay) -> Self {
        self.slack = Some(relay);
        self
    }

    /// Count a transcription request
    pub fn record_transcription(&self) -> u64 {
        self.transcriptions.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn transcription_count(&self) -> u64 {
        self.transcriptions.load(Ordering::SeqCst)
    }

    pub fn record_relayed_mention(&self) -> u64 {
        self.relayed_mentions.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn relayed_mention_count(&self) -> u64 {
        self.relayed_mentions.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
