//! Spoken-reply playback state machine.
//!
//! [`PlaybackController`] drives `Idle → Generating → Playing → Idle` and
//! owns the auto-speak rule: a reply is spoken automatically iff the
//! session transition is exactly `Streaming → Ready` — a completed
//! streamed turn. Rate-limit turns (`Submitted → Ready`) and status churn
//! never re-trigger speech.
//!
//! [`speak`](PlaybackController::speak) is a toggle: asking for the
//! message that is already playing stops it, and starting any new message
//! always stops the previous one first. Synthesized clips are dropped once
//! playback ends or is superseded.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::synthesize::SpeechSynthesis;
use crate::audio::AudioPlayback;
use crate::chat::session::{ChatSession, ChatStatus};
use crate::chat::StatusTransition;
use crate::error::Result;

/// Playback lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing playing or being generated.
    Idle,
    /// Waiting for the synthesis service.
    Generating,
    /// Audio is going to the output device.
    Playing,
}

/// Text-to-speech controller for assistant replies.
pub struct PlaybackController {
    synthesis: Arc<dyn SpeechSynthesis>,
    playback: Box<dyn AudioPlayback>,
    state: PlaybackState,
    active_message_id: Option<String>,
    auto_speak: bool,
}

impl PlaybackController {
    /// Create a controller over a synthesis client and output device.
    pub fn new(
        synthesis: Arc<dyn SpeechSynthesis>,
        playback: Box<dyn AudioPlayback>,
        auto_speak: bool,
    ) -> Self {
        Self {
            synthesis,
            playback,
            state: PlaybackState::Idle,
            active_message_id: None,
            auto_speak,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// The message being generated or played, if any.
    pub fn active_message_id(&self) -> Option<&str> {
        self.active_message_id.as_deref()
    }

    /// React to a session status transition.
    ///
    /// Speaks the last assistant message iff auto-speak is on and the
    /// transition is exactly `Streaming → Ready`. Every other pair,
    /// including `Ready → Ready` churn and the rate-limit path, is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Propagates synthesis and device errors from [`speak`](Self::speak).
    pub async fn observe_transition(
        &mut self,
        transition: StatusTransition,
        session: &ChatSession,
    ) -> Result<()> {
        if !self.auto_speak {
            return Ok(());
        }
        if transition.from != ChatStatus::Streaming || transition.to != ChatStatus::Ready {
            return Ok(());
        }
        let Some(message) = session.last_assistant() else {
            debug!("turn completed with no assistant message to speak");
            return Ok(());
        };
        let id = message.id.clone();
        let text = message.text();
        self.speak(&id, &text).await
    }

    /// Speak a message, or stop it if it is the one already playing.
    ///
    /// Any other playback in progress is stopped before the new clip
    /// starts. Empty text is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Synthesis`](crate::error::ChatError::Synthesis)
    /// when synthesis or the output device fails; the controller reverts
    /// to `Idle`.
    pub async fn speak(&mut self, message_id: &str, text: &str) -> Result<()> {
        self.refresh();

        // Toggle: speaking the active message stops it instead.
        if self.state == PlaybackState::Playing
            && self.active_message_id.as_deref() == Some(message_id)
        {
            info!("toggling off playback of {message_id}");
            self.stop();
            return Ok(());
        }

        // One owner of the output device at a time.
        self.stop();

        if text.trim().is_empty() {
            return Ok(());
        }

        self.state = PlaybackState::Generating;
        self.active_message_id = Some(message_id.to_string());

        let clip = match self.synthesis.synthesize(text).await {
            Ok(clip) => clip,
            Err(e) => {
                warn!("synthesis failed for {message_id}: {e}");
                self.state = PlaybackState::Idle;
                self.active_message_id = None;
                return Err(e);
            }
        };

        // A toggle/stop may have landed while we were generating.
        if self.active_message_id.as_deref() != Some(message_id) {
            debug!("playback of {message_id} superseded during synthesis");
            return Ok(());
        }

        if let Err(e) = self.playback.play(&clip) {
            self.state = PlaybackState::Idle;
            self.active_message_id = None;
            return Err(e);
        }
        self.state = PlaybackState::Playing;
        info!("speaking {message_id} ({:.1}s)", clip.duration_secs());
        Ok(())
    }

    /// Stop any playback and return to `Idle`.
    pub fn stop(&mut self) {
        self.playback.stop();
        self.state = PlaybackState::Idle;
        self.active_message_id = None;
    }

    /// Mark playback as finished (the clip ran to its end).
    pub fn playback_finished(&mut self) {
        self.state = PlaybackState::Idle;
        self.active_message_id = None;
    }

    /// Fold device-side completion into the state machine.
    fn refresh(&mut self) {
        if self.state == PlaybackState::Playing && !self.playback.is_playing() {
            self.playback_finished();
        }
    }
}
