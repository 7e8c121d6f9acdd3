//! Tesseract OCR engine
//!
//! Runs the `tesseract` CLI, feeding the image on stdin and reading the text
//! from stdout.

use std::process::Stdio;

use async_trait::async_trait;
use image::RgbImage;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use ragkit_core::OcrConfig;

use crate::{encode_png, OcrEngine, OcrError, OcrResult, Result};

/// Tesseract OCR engine configuration
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Language code(s) for OCR (e.g., "eng", "eng+deu")
    pub language: String,
    /// Page segmentation mode (PSM)
    pub psm: Option<u8>,
    /// OCR engine mode (OEM)
    pub oem: Option<u8>,
    /// Path to tesseract executable
    pub executable_path: Option<String>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            psm: None,
            oem: None,
            executable_path: None,
        }
    }
}

impl TesseractConfig {
    /// Tesseract settings from the service config
    pub fn from_ocr_config(config: &OcrConfig) -> Self {
        let mut tesseract = Self::default().with_language(config.tesseract_language.clone());
        if let Some(psm) = config.tesseract_psm {
            tesseract = tesseract.with_psm(psm);
        }
        if let Some(oem) = config.tesseract_oem {
            tesseract = tesseract.with_oem(oem);
        }
        tesseract.executable_path = config.tesseract_path.clone();
        tesseract
    }

    /// Set language
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set page segmentation mode
    pub fn with_psm(mut self, psm: u8) -> Self {
        self.psm = Some(psm);
        self
    }

    /// Set OCR engine mode
    pub fn with_oem(mut self, oem: u8) -> Self {
        self.oem = Some(oem);
        self
    }
}

/// Tesseract OCR engine wrapper
pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    /// Create with custom config
    pub fn with_config(config: TesseractConfig) -> Self {
        Self { config }
    }

    fn executable(&self) -> &str {
        self.config
            .executable_path
            .as_deref()
            .unwrap_or("tesseract")
    }

    /// Build command arguments; input is stdin, output stdout
    fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.config.language.clone(),
        ];

        if let Some(psm) = self.config.psm {
            args.push("--psm".to_string());
            args.push(psm.to_string());
        }

        if let Some(oem) = self.config.oem {
            args.push("--oem".to_string());
            args.push(oem.to_string());
        }

        args
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn transcribe(&self, image: &RgbImage) -> Result<OcrResult> {
        let png = encode_png(image)?;

        let mut child = Command::new(self.executable())
            .args(self.build_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                OcrError::EngineNotAvailable(format!("Cannot start {}: {e}", self.executable()))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&png).await?;
            // closing stdin lets tesseract start
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ExecutionFailed(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(OcrResult::new(text, self.name()).with_language(self.config.language.clone()))
    }

    async fn is_available(&self) -> bool {
        Command::new(self.executable())
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}
