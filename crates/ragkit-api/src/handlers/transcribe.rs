//! Image transcription handler
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// Transcription response body
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    pub transcription: String,
}

/// Find the first `image` file field
async fn image_upload(multipart: &mut Multipart) -> Result<Bytes, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        // a plain form field without a filename is not a file
        let file_name = field.file_name().map(str::to_owned);
        match file_name.as_deref() {
            None => continue,
            Some("") => return Err(AppError::BadRequest("No selected file".to_string())),
            Some(_) => return Ok(field.bytes().await?),
        }
    }

    Err(AppError::BadRequest("No image file provided".to_string()))
}

/// `POST /transcribe`: recognize the handwritten text in an uploaded image
pub async fn transcribe(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TranscriptionResponse>, AppError> {
    let mut multipart = multipart
        .map_err(|_| AppError::BadRequest("No image file provided".to_string()))?;
    let bytes = image_upload(&mut multipart).await?;

    let count = state.record_transcription();
    tracing::info!(bytes = bytes.len(), request = count, "Transcribing upload");

    let result = ragkit_ocr::transcribe_bytes(state.engine.as_ref(), &bytes)
        .await
        .map_err(|e| {
            tracing::error!(engine = state.engine.name(), error = %e, "Transcription failed");
            AppError::from(e)
        })?;

    tracing::debug!(chars = result.text.chars().count(), "Transcription done");
    Ok(Json(TranscriptionResponse {
        transcription: result.text,
    }))
}
