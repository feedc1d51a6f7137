//! Conversation state, stream assembly, and send orchestration.
//!
//! The chat layer turns decoded stream events into a structured
//! conversation and drives the send/cancel lifecycle:
//!
//! - [`message`] / [`session`] — the conversation data model
//! - [`assembler`] — applies stream events to the open assistant turn
//! - [`tracker`] — exactly-once gating for tool side effects
//! - [`backend`] — the HTTP seam producing the response stream
//! - [`artifact`] — fire-and-forget delivery of tool completions
//! - [`controller`] — the session state machine tying it together

pub mod artifact;
pub mod assembler;
pub mod backend;
pub mod controller;
pub mod message;
pub mod session;
pub mod tracker;

pub use controller::{SessionController, StatusTransition};
pub use message::{Message, Part, Role, ToolState};
pub use session::{ChatSession, ChatStatus, SessionId, StoredSession, generate_session_id};
