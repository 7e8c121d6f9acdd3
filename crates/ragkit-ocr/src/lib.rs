//! ragkit OCR - Handwritten text recognition
//!
//! Turns an uploaded image into text. Images are decoded and converted to
//! RGB here; recognition is delegated to an `OcrEngine`:
//! - `HfInferenceEngine`: a hosted TrOCR model behind the Hugging Face
//!   inference API
//! - `TesseractEngine`: the local Tesseract CLI

use std::io::Cursor;

use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use ragkit_core::{OcrConfig, OcrEngineKind};
use thiserror::Error;

pub mod hf_inference;
pub mod tesseract;

pub use hf_inference::HfInferenceEngine;
pub use tesseract::{TesseractConfig, TesseractEngine};

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR engine not available: {0}")]
    EngineNotAvailable(String),

    #[error("Cannot decode image: {0}")]
    InvalidImage(String),

    #[error("OCR execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Inference API error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OcrError>;

/// Transcription of one image
#[derive(Debug, Clone, PartialEq)]
pub struct OcrResult {
    /// Recognized text
    pub text: String,
    /// Engine that produced it
    pub engine: String,
    /// Language hint used, if the engine takes one
    pub language: Option<String>,
}

impl OcrResult {
    pub fn new(text: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            engine: engine.into(),
            language: None,
        }
    }

    /// Set language hint
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Trait for OCR engines
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize the text in an RGB image
    async fn transcribe(&self, image: &RgbImage) -> Result<OcrResult>;

    /// Check if the engine can be used
    async fn is_available(&self) -> bool;

    /// Get the engine name
    fn name(&self) -> &str;
}

// ============================================================================
// Image handling
// ============================================================================

/// Decode an uploaded image of any supported format and convert it to RGB
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(bytes).map_err(|e| OcrError::InvalidImage(e.to_string()))?;
    Ok(image.to_rgb8())
}

/// PNG encoding of an RGB image, the wire format for engines
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| OcrError::InvalidImage(e.to_string()))?;
    Ok(buf.into_inner())
}

/// Decode `bytes` and transcribe them with `engine`
pub async fn transcribe_bytes(engine: &dyn OcrEngine, bytes: &[u8]) -> Result<OcrResult> {
    let image = decode_rgb(bytes)?;
    tracing::debug!(
        engine = engine.name(),
        width = image.width(),
        height = image.height(),
        "Transcribing image"
    );
    engine.transcribe(&image).await
}

/// Create an OCR engine from config
pub fn create_ocr_engine(config: &OcrConfig) -> Result<Box<dyn OcrEngine>> {
    match config.engine {
        OcrEngineKind::HfInference => Ok(Box::new(HfInferenceEngine::from_config(config)?)),
        OcrEngineKind::Tesseract => Ok(Box::new(TesseractEngine::with_config(
            TesseractConfig::from_ocr_config(config),
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb};

    fn png_bytes(image: &RgbImage) -> Vec<u8> {
        encode_png(image).unwrap()
    }

    #[test]
    fn test_decode_rgb_keeps_pixels() {
        let mut image = RgbImage::new(4, 2);
        image.put_pixel(1, 1, Rgb([200, 10, 30]));

        let decoded = decode_rgb(&png_bytes(&image)).unwrap();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.get_pixel(1, 1), &Rgb([200, 10, 30]));
    }

    #[test]
    fn test_grayscale_is_converted_to_rgb() {
        let gray = GrayImage::from_pixel(3, 3, Luma([128]));
        let mut buf = Cursor::new(Vec::new());
        gray.write_to(&mut buf, ImageFormat::Png).unwrap();

        let decoded = decode_rgb(buf.get_ref()).unwrap();
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([128, 128, 128]));
    }

    #[test]
    fn test_invalid_image() {
        assert!(matches!(
            decode_rgb(b"definitely not an image"),
            Err(OcrError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_ocr_result_builder() {
        let result = OcrResult::new("Hello World", "tesseract").with_language("eng");
        assert_eq!(result.text, "Hello World");
        assert_eq!(result.engine, "tesseract");
        assert_eq!(result.language, Some("eng".to_string()));
    }

    #[test]
    fn test_create_ocr_engine() {
        let engine = create_ocr_engine(&OcrConfig::default()).unwrap();
        assert_eq!(engine.name(), "hf_inference");

        let config = OcrConfig {
            engine: OcrEngineKind::Tesseract,
            ..Default::default()
        };
        let engine = create_ocr_engine(&config).unwrap();
        assert_eq!(engine.name(), "tesseract");
    }

    struct EchoEngine;

    #[async_trait]
    impl OcrEngine for EchoEngine {
        async fn transcribe(&self, image: &RgbImage) -> Result<OcrResult> {
            Ok(OcrResult::new(
                format!("{}x{}", image.width(), image.height()),
                "echo",
            ))
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_transcribe_bytes_decodes_first() {
        let bytes = png_bytes(&RgbImage::new(7, 5));
        let result = transcribe_bytes(&EchoEngine, &bytes).await.unwrap();
        assert_eq!(result.text, "7x5");

        assert!(matches!(
            transcribe_bytes(&EchoEngine, b"garbage").await,
            Err(OcrError::InvalidImage(_))
        ));
    }
}
