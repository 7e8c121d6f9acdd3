//! Hosted TrOCR through the Hugging Face inference API
//!
//! The image is posted as PNG to `{inference_url}/{model}`; image-to-text
//! models answer with `[{"generated_text": "..."}]`.

use async_trait::async_trait;
use image::RgbImage;
use ragkit_core::OcrConfig;
use reqwest::Client;
use serde::Deserialize;

use crate::{encode_png, OcrEngine, OcrError, OcrResult, Result};

/// Image-to-text model served by the inference API
pub struct HfInferenceEngine {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

impl HfInferenceEngine {
    /// Create from config
    pub fn from_config(config: &OcrConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| OcrError::EngineNotAvailable(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/{}",
                config.inference_url.trim_end_matches('/'),
                config.model
            ),
            api_token: config.api_token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Text of the first generation, as decoded by the model
fn parse_generation(body: &str) -> Result<String> {
    let generations: Vec<Generation> = serde_json::from_str(body)
        .map_err(|e| OcrError::ExecutionFailed(format!("Unexpected inference response: {e}")))?;

    generations
        .into_iter()
        .next()
        .map(|g| g.generated_text)
        .ok_or_else(|| OcrError::ExecutionFailed("Inference returned no text".to_string()))
}

/// Error message of a failed call, preferring the API's `error` field
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiError>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string())
}

#[async_trait]
impl OcrEngine for HfInferenceEngine {
    async fn transcribe(&self, image: &RgbImage) -> Result<OcrResult> {
        let png = encode_png(image)?;

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            // block until a cold model is loaded instead of failing with 503
            .header("x-wait-for-model", "true")
            .body(png);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OcrError::ExecutionFailed(format!("Inference request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OcrError::ExecutionFailed(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            tracing::error!(endpoint = %self.endpoint, status = status.as_u16(), "Inference call failed");
            return Err(OcrError::Upstream {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(OcrResult::new(parse_generation(&body)?, self.name()))
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(&self.endpoint)
            .send()
            .await
            .map(|r| !r.status().is_server_error())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "hf_inference"
    }
}
