//! Speech-to-text client for a Whisper-style `/audio/transcriptions` endpoint.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{ApiError, SpeechToText};
use crate::extract::AudioFormat;

/// Uploads can carry up to 25 MB of audio; leave room for slow links.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// JSON body of a successful transcription response.
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// HTTP client for the remote transcription service.
pub struct WhisperClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl WhisperClient {
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(ApiError::from_transport)?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<String, ApiError> {
        let bytes = fs_err::read(audio_path).map_err(|e| {
            ApiError::InvalidRequest(format!("cannot read segment {}: {}", audio_path.display(), e))
        })?;
        if bytes.is_empty() {
            return Err(ApiError::InvalidRequest(format!(
                "segment {} is empty",
                audio_path.display()
            )));
        }

        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("segment.mp3")
            .to_string();
        let mime = audio_path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(AudioFormat::from_extension)
            .map(|f| f.mime_type())
            .unwrap_or("application/octet-stream");

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let mut form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "json");
        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }

        let url = format!("{}/audio/transcriptions", self.api_base);
        tracing::debug!("Uploading {} to {}", audio_path.display(), url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &headers, body));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ApiError::UnexpectedResponse(e.to_string()))?;

        Ok(parsed.text)
    }
}
