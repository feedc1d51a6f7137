//! Chat session state and persistence shape.
//!
//! A [`ChatSession`] is the in-memory conversation: its ID, ordered
//! message list, and [`ChatStatus`]. [`StoredSession`] pairs the session
//! content with [`SessionMeta`] bookkeeping for the persistence layer.
//!
//! # Examples
//!
//! ```
//! use sona::chat::session::{ChatSession, ChatStatus};
//!
//! let session = ChatSession::new("sess_001");
//! assert_eq!(session.status, ChatStatus::Ready);
//! assert!(session.messages.is_empty());
//! ```

use serde::{Deserialize, Serialize};

use super::message::Message;

/// Unique session identifier.
pub type SessionId = String;

/// Current schema version for session serialization.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// The session's send/stream lifecycle state.
///
/// Transitions: `Ready → Submitted → Streaming → {Ready | Error}`, with
/// the rate-limit path returning `Submitted → Ready` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    /// No request in flight; history is committed.
    Ready,
    /// A request has been issued but no stream consumed yet.
    Submitted,
    /// The response stream is being applied to the trailing message.
    Streaming,
    /// The last request failed; the error was surfaced to the caller.
    Error,
}

impl std::fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Submitted => write!(f, "submitted"),
            Self::Streaming => write!(f, "streaming"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// An in-memory chat session.
///
/// Exactly one assistant message is open (mutable) while `status` is
/// `Submitted` or `Streaming`: the last element of `messages`. Once the
/// status returns to `Ready` or `Error`, history is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique identifier for this session.
    pub id: SessionId,
    /// Ordered conversation history.
    pub messages: Vec<Message>,
    /// Current lifecycle state.
    pub status: ChatStatus,
    /// Persistence bookkeeping; `created_at` is fixed at creation, only
    /// `updated_at` advances on save.
    pub meta: SessionMeta,
}

impl ChatSession {
    /// Create a new empty session in the `Ready` state.
    pub fn new(id: impl Into<SessionId>) -> Self {
        let id = id.into();
        Self {
            meta: SessionMeta::new(id.clone()),
            id,
            messages: Vec::new(),
            status: ChatStatus::Ready,
        }
    }

    /// The trailing message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The last assistant message, if any.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == super::message::Role::Assistant)
    }
}

/// Bookkeeping metadata persisted alongside a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    /// The session's unique ID.
    pub id: SessionId,
    /// Unix epoch seconds when the session was created.
    pub created_at: u64,
    /// Unix epoch seconds when the session was last updated.
    pub updated_at: u64,
    /// Schema version for forward compatibility.
    pub schema_version: u32,
}

impl SessionMeta {
    /// Create metadata for a new session.
    pub fn new(id: impl Into<SessionId>) -> Self {
        let now = current_epoch_secs();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    /// Update the `updated_at` timestamp to now.
    pub fn touch(&mut self) {
        self.updated_at = current_epoch_secs();
    }
}

/// The durable form of a session: metadata plus message history.
///
/// Status is transient and deliberately not persisted; a hydrated session
/// always starts `Ready`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    /// Session metadata (ID, timestamps, schema version).
    pub meta: SessionMeta,
    /// The full message history.
    pub messages: Vec<Message>,
}

impl StoredSession {
    /// Snapshot a live session for persistence.
    ///
    /// The session's original `created_at` is carried through; only
    /// `updated_at` advances.
    pub fn from_session(session: &ChatSession) -> Self {
        let mut meta = session.meta.clone();
        meta.touch();
        Self {
            meta,
            messages: session.messages.clone(),
        }
    }

    /// Rebuild a live session from persisted state.
    pub fn into_session(self) -> ChatSession {
        ChatSession {
            id: self.meta.id.clone(),
            messages: self.messages,
            status: ChatStatus::Ready,
            meta: self.meta,
        }
    }
}

/// Returns the current Unix epoch in seconds.
fn current_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Generate a unique session ID.
///
/// Format: `sess_{unix_millis}_{uuid_prefix}`
pub fn generate_session_id() -> SessionId {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("sess_{now}_{}", &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Message;

    // ── ChatSession ───────────────────────────────────────────

    #[test]
    fn new_session_is_ready_and_empty() {
        let session = ChatSession::new("sess_t1");
        assert_eq!(session.id, "sess_t1");
        assert_eq!(session.status, ChatStatus::Ready);
        assert!(session.last_message().is_none());
    }

    #[test]
    fn last_assistant_skips_user_messages() {
        let mut session = ChatSession::new("sess_t2");
        session.messages.push(Message::assistant("first"));
        session.messages.push(Message::user("question"));
        let last = session.last_assistant();
        match last {
            Some(m) => assert_eq!(m.text(), "first"),
            None => unreachable!("assistant message present"),
        }
    }

    #[test]
    fn status_display() {
        assert_eq!(ChatStatus::Ready.to_string(), "ready");
        assert_eq!(ChatStatus::Submitted.to_string(), "submitted");
        assert_eq!(ChatStatus::Streaming.to_string(), "streaming");
        assert_eq!(ChatStatus::Error.to_string(), "error");
    }

    // ── StoredSession ─────────────────────────────────────────

    #[test]
    fn stored_session_round_trip() {
        let mut session = ChatSession::new("sess_rt");
        session.messages.push(Message::user("hello"));
        session.messages.push(Message::assistant("hi"));
        session.status = ChatStatus::Error;

        let stored = StoredSession::from_session(&session);
        assert_eq!(stored.meta.schema_version, CURRENT_SCHEMA_VERSION);

        let rebuilt = stored.into_session();
        assert_eq!(rebuilt.id, "sess_rt");
        assert_eq!(rebuilt.messages.len(), 2);
        // Status is transient: hydration always starts Ready
        assert_eq!(rebuilt.status, ChatStatus::Ready);
    }

    #[test]
    fn repeated_saves_preserve_created_at() {
        let mut session = ChatSession::new("sess_keep");
        session.meta.created_at = 1_000;
        session.meta.updated_at = 1_000;

        let stored = StoredSession::from_session(&session);
        assert_eq!(stored.meta.created_at, 1_000);
        assert!(stored.meta.updated_at >= 1_000);

        // Hydrate and save again: creation time still stable.
        let rebuilt = stored.into_session();
        let again = StoredSession::from_session(&rebuilt);
        assert_eq!(again.meta.created_at, 1_000);
    }

    #[test]
    fn stored_session_serde() {
        let session = ChatSession::new("sess_json");
        let stored = StoredSession::from_session(&session);
        let json = serde_json::to_string(&stored).unwrap_or_default();
        assert!(!json.is_empty());
        let parsed: Result<StoredSession, _> = serde_json::from_str(&json);
        assert!(parsed.is_ok());
    }

    // ── SessionMeta ───────────────────────────────────────────

    #[test]
    fn meta_touch_advances_timestamp() {
        let mut meta = SessionMeta::new("sess_m");
        let original = meta.updated_at;
        meta.touch();
        assert!(meta.updated_at >= original);
    }

    // ── generate_session_id ───────────────────────────────────

    #[test]
    fn generated_ids_are_unique_and_prefixed() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert!(a.starts_with("sess_"));
        assert_ne!(a, b);
    }
}
