//! Generation backend: the single POST that produces the chat stream.
//!
//! [`GenerationBackend`] is the narrow seam between the session controller
//! and the network. The backend either hands back the raw chunked response
//! body for decoding, or a distinguished rate-limit reply; all other
//! failures are transport errors.
//!
//! # Examples
//!
//! ```no_run
//! use sona::chat::backend::{HttpBackend, GenerationBackend, ChatRequest};
//!
//! # async fn example() -> sona::Result<()> {
//! let backend = HttpBackend::new("http://localhost:3000/api/chat");
//! let request = ChatRequest::new("sess_1", Vec::new());
//! let reply = backend.send(&request).await?;
//! # Ok(())
//! # }
//! ```

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::message::Message;
use crate::error::{ChatError, Result};

/// A boxed stream of raw response body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// The request surface: one POST carrying the session identity and the
/// full message history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The session this turn belongs to.
    pub session_id: String,
    /// The complete conversation history, newest last.
    pub history: Vec<Message>,
}

impl ChatRequest {
    /// Create a request for the given session and history snapshot.
    pub fn new(session_id: impl Into<String>, history: Vec<Message>) -> Self {
        Self {
            session_id: session_id.into(),
            history,
        }
    }
}

/// The backend's answer to a send.
pub enum BackendReply {
    /// A successful response: the chunked body, ready for decoding.
    Stream(ByteStream),
    /// The distinguished rate-limit status; no stream is consumed.
    RateLimited {
        /// The `{error}` body message, for the synthetic warning.
        message: String,
    },
}

impl std::fmt::Debug for BackendReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("BackendReply::Stream(..)"),
            Self::RateLimited { message } => f
                .debug_struct("BackendReply::RateLimited")
                .field("message", message)
                .finish(),
        }
    }
}

/// Trait for the generation backend.
///
/// Only one concurrent call per session is meaningful; the session
/// controller cancels any prior stream before issuing a new send.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Issue the request and return the reply.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Transport`] for network failures and
    /// non-success statuses other than the rate-limit status.
    async fn send(&self, request: &ChatRequest) -> Result<BackendReply>;
}

/// HTTP backend speaking the line-framed stream protocol.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    chat_url: String,
}

/// Error body shape for non-success responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl HttpBackend {
    /// Create a backend pointed at the given chat endpoint.
    pub fn new(chat_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            chat_url: chat_url.into(),
        }
    }

    /// Create a backend with a shared HTTP client.
    pub fn with_client(client: reqwest::Client, chat_url: impl Into<String>) -> Self {
        Self {
            client,
            chat_url: chat_url.into(),
        }
    }

    /// Extract the `{error}` message from a response body, with fallback.
    fn error_message(body: &str, fallback: &str) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn send(&self, request: &ChatRequest) -> Result<BackendReply> {
        let request_id = Uuid::new_v4().simple().to_string();
        debug!(
            "sending chat request {request_id} ({} messages)",
            request.history.len()
        );

        let response = self
            .client
            .post(&self.chat_url)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::Transport(format!("chat request failed: {e}")))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            let message = Self::error_message(&body, "rate limit exceeded");
            warn!("chat request {request_id} rate limited: {message}");
            return Ok(BackendReply::RateLimited { message });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = Self::error_message(&body, status.as_str());
            return Err(ChatError::Transport(format!(
                "chat backend returned {status}: {message}"
            )));
        }

        let byte_stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ChatError::Transport(format!("stream read: {e}"))));

        Ok(BackendReply::Stream(Box::pin(byte_stream)))
    }
}
