use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

/// Provider-specific knobs for one transcription call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscribeOptions {
    pub model: String,
    pub language: String,
}

/// Speech-to-text collaborator.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path, options: &TranscribeOptions) -> Result<String, TranscriptionError>;
}

/// Client for an OpenAI-compatible `/audio/transcriptions` endpoint (Groq
/// Whisper by default).
pub struct WhisperApiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperApiClient {
    async fn transcribe(&self, audio_path: &Path, options: &TranscribeOptions) -> Result<String, TranscriptionError> {
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("recording.mp3")
            .to_string();
        let bytes = tokio::fs::read(audio_path).await?;

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("model", options.model.clone())
            .text("language", options.language.clone())
            .text("response_format", "json");

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transcription provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Failed to read recording: {0}")]
    Io(#[from] std::io::Error),
}
