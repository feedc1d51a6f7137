//! Conversation message model: messages and their ordered parts.
//!
//! A [`Message`] is a list of ordered [`Part`]s: prose text interleaved
//! with tool invocations. While a message is the trailing assistant
//! message of an active stream it is mutable; once the session returns to
//! `Ready` or `Error` it is append-only from the outside.
//!
//! # Examples
//!
//! ```
//! use sona::chat::message::{Message, Role};
//!
//! let msg = Message::user("Hello");
//! assert_eq!(msg.role, Role::User);
//! assert_eq!(msg.text(), "Hello");
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instruction.
    System,
    /// End-user input (typed or transcribed).
    User,
    /// Backend-generated response.
    Assistant,
}

/// Lifecycle state of a tool part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolState {
    /// The call's input arguments have arrived; output is pending.
    InputAvailable,
    /// The call's output has arrived; terminal state.
    OutputAvailable,
}

/// One ordered element of a message: prose or a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Part {
    /// A run of assistant or user prose.
    Text {
        /// The text content.
        text: String,
    },
    /// A tool invocation with its input and (eventually) output.
    Tool {
        /// Unique identifier correlating input and output events.
        tool_call_id: String,
        /// The tool's name.
        tool_name: String,
        /// Current lifecycle state.
        state: ToolState,
        /// The call's input arguments.
        input: serde_json::Value,
        /// The call's output, present once `state` is `OutputAvailable`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<serde_json::Value>,
    },
}

impl Part {
    /// The tool call ID, if this is a tool part.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Self::Tool { tool_call_id, .. } => Some(tool_call_id),
            Self::Text { .. } => None,
        }
    }
}

/// A single conversation message: an ID, a role, and ordered parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub id: String,
    /// Who authored this message.
    pub role: Role,
    /// Ordered content parts. Part order is insertion order; non-text
    /// parts never reorder relative to each other once inserted.
    pub parts: Vec<Part>,
}

impl Message {
    /// Create a message with a generated ID and the given role and parts.
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            id: format!("msg_{}", Uuid::new_v4().simple()),
            role,
            parts,
        }
    }

    /// Create a user message from plain text.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::Text { text: text.into() }])
    }

    /// Create an assistant message from plain text.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![Part::Text { text: text.into() }])
    }

    /// Create a system message from plain text.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Part::Text { text: text.into() }])
    }

    /// Create an empty assistant message, ready to receive streamed parts.
    pub fn assistant_open() -> Self {
        Self::new(Role::Assistant, Vec::new())
    }

    /// All text parts concatenated.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                Part::Tool { .. } => None,
            })
            .collect()
    }

    /// Append a part, preserving insertion order.
    pub fn push_part(&mut self, part: Part) {
        self.parts.push(part);
    }

    /// Find a tool part by its call ID.
    pub fn tool_part(&self, tool_call_id: &str) -> Option<&Part> {
        self.parts
            .iter()
            .find(|p| p.tool_call_id() == Some(tool_call_id))
    }
}
