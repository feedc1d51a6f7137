//! Text-to-speech over HTTP.
//!
//! [`SpeechSynthesis`] is the seam the playback controller talks to;
//! [`HttpSynthesis`] POSTs `{ "text": ..., "voice": ... }` and decodes
//! the returned WAV body into an [`AudioClip`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::decode_wav;
use crate::audio::AudioClip;
use crate::error::{ChatError, Result};

/// Turns text into a playable clip.
#[async_trait]
pub trait SpeechSynthesis: Send + Sync {
    /// Synthesize speech for the text.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Synthesis`] when the service rejects the text
    /// or the request fails.
    async fn synthesize(&self, text: &str) -> Result<AudioClip>;
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP synthesis client.
#[derive(Debug, Clone)]
pub struct HttpSynthesis {
    client: reqwest::Client,
    synthesis_url: String,
    voice: Option<String>,
}

impl HttpSynthesis {
    /// Create a client pointed at the given endpoint.
    pub fn new(synthesis_url: impl Into<String>, voice: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            synthesis_url: synthesis_url.into(),
            voice,
        }
    }
}

#[async_trait]
impl SpeechSynthesis for HttpSynthesis {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        debug!("synthesizing {} chars", text.len());

        let request = SynthesisRequest {
            text,
            voice: self.voice.as_deref(),
        };

        let response = self
            .client
            .post(&self.synthesis_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Synthesis(format!("synthesis request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| status.as_str().to_string());
            return Err(ChatError::Synthesis(format!("synthesis failed: {message}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChatError::Synthesis(format!("synthesis body read failed: {e}")))?;

        decode_wav(&bytes).map_err(|e| ChatError::Synthesis(format!("bad synthesis audio: {e}")))
    }
}
