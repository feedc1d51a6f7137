//! Sona: voice-enabled streaming chat client.
//!
//! This crate talks to a generative-dialogue backend over an incremental,
//! chunked response and rebuilds a structured conversation of interleaved
//! prose and tool invocations, while coordinating two real-time side
//! channels and a persistence hand-off.
//!
//! # Architecture
//!
//! Independent layers connected by narrow trait seams:
//! - **Stream decoding**: [`stream`] turns raw body chunks into protocol
//!   events, invariant to chunk boundaries
//! - **Conversation**: [`chat`] assembles events into messages and drives
//!   the send/cancel state machine with exactly-once tool side effects
//! - **Voice**: [`voice`] runs the push-to-talk capture and spoken-reply
//!   playback state machines over [`audio`]'s cpal devices
//! - **Persistence**: [`store`] saves sessions locally or remotely with a
//!   one-time sign-in migration

pub mod audio;
pub mod chat;
pub mod config;
pub mod error;
pub mod store;
pub mod stream;
pub mod voice;

pub use chat::{ChatSession, ChatStatus, Message, SessionController, StatusTransition};
pub use config::SonaConfig;
pub use error::{ChatError, Result};
pub use store::PersistenceBridge;
