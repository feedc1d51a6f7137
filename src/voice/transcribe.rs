//! Speech-to-text over HTTP.
//!
//! [`TranscriptionClient`] is the seam the capture controller talks to;
//! [`HttpTranscription`] POSTs the recorded clip as a WAV body and reads
//! back `{ "text": ... }`.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::encode_wav;
use crate::audio::AudioClip;
use crate::error::{ChatError, Result};

/// Turns a recorded clip into text.
#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    /// Transcribe the clip.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Capture`] when the service rejects the audio
    /// or the request fails.
    async fn transcribe(&self, clip: &AudioClip) -> Result<String>;
}

/// Success body from the transcription endpoint.
#[derive(Debug, Deserialize)]
struct TranscriptionBody {
    text: String,
}

/// Error body from the transcription endpoint.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP transcription client.
#[derive(Debug, Clone)]
pub struct HttpTranscription {
    client: reqwest::Client,
    transcription_url: String,
}

impl HttpTranscription {
    /// Create a client pointed at the given endpoint.
    pub fn new(transcription_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            transcription_url: transcription_url.into(),
        }
    }

    /// Create a client with a shared HTTP client.
    pub fn with_client(client: reqwest::Client, transcription_url: impl Into<String>) -> Self {
        Self {
            client,
            transcription_url: transcription_url.into(),
        }
    }
}

#[async_trait]
impl TranscriptionClient for HttpTranscription {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String> {
        let body = encode_wav(clip)?;
        debug!(
            "transcribing {:.1}s clip ({} bytes)",
            clip.duration_secs(),
            body.len()
        );

        let response = self
            .client
            .post(&self.transcription_url)
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(body)
            .send()
            .await
            .map_err(|e| ChatError::Capture(format!("transcription request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| status.as_str().to_string());
            return Err(ChatError::Capture(format!(
                "transcription failed: {message}"
            )));
        }

        let body: TranscriptionBody = response
            .json()
            .await
            .map_err(|e| ChatError::Capture(format!("bad transcription response: {e}")))?;

        info!("transcribed {} chars", body.text.len());
        Ok(body.text)
    }
}
