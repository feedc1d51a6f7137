//! Push-to-talk capture state machine.
//!
//! [`VoiceCaptureController`] drives `Idle → Recording → Transcribing →
//! Idle`. The microphone is held only while `Recording`; `stop_and_send`
//! releases the device *before* transcription starts, so a slow or failing
//! transcription can never keep the device captive. Transcribed text
//! enters the session exactly as typed input would.

use std::sync::Arc;

use tracing::{info, warn};

use super::transcribe::TranscriptionClient;
use crate::audio::AudioCapture;
use crate::chat::SessionController;
use crate::error::{ChatError, Result};

/// Capture lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No recording active; the device is free.
    Idle,
    /// The microphone is held and samples are accumulating.
    Recording,
    /// The device is released; the clip is at the transcription service.
    Transcribing,
}

/// Push-to-talk controller: record, transcribe, send.
pub struct VoiceCaptureController {
    capture: Box<dyn AudioCapture>,
    transcription: Arc<dyn TranscriptionClient>,
    state: CaptureState,
}

impl VoiceCaptureController {
    /// Create a controller over a capture device and transcription client.
    pub fn new(capture: Box<dyn AudioCapture>, transcription: Arc<dyn TranscriptionClient>) -> Self {
        Self {
            capture,
            transcription,
            state: CaptureState::Idle,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Acquire the microphone and begin recording.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Capture`] when not `Idle` or when the device
    /// cannot be opened.
    pub fn start_recording(&mut self) -> Result<()> {
        if self.state != CaptureState::Idle {
            return Err(ChatError::Capture(format!(
                "cannot start recording while {:?}",
                self.state
            )));
        }
        self.capture.start()?;
        self.state = CaptureState::Recording;
        info!("recording started");
        Ok(())
    }

    /// Stop recording, transcribe the clip, and send the text.
    ///
    /// The device is released first in every path. An empty transcription
    /// is dropped without a send. Whatever the outcome, the controller
    /// finishes `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Capture`] when not `Recording`, when the
    /// capture stream failed, or when transcription fails; send errors
    /// propagate from [`SessionController::send`].
    pub async fn stop_and_send(&mut self, session: &SessionController) -> Result<()> {
        if self.state != CaptureState::Recording {
            return Err(ChatError::Capture("no recording in progress".into()));
        }

        // Release the device before anything slow happens.
        let clip = match self.capture.stop() {
            Ok(clip) => clip,
            Err(e) => {
                self.state = CaptureState::Idle;
                return Err(e);
            }
        };
        self.state = CaptureState::Transcribing;

        let text = match self.transcription.transcribe(&clip).await {
            Ok(text) => text,
            Err(e) => {
                self.state = CaptureState::Idle;
                warn!("transcription failed: {e}");
                return Err(e);
            }
        };
        self.state = CaptureState::Idle;

        if text.trim().is_empty() {
            info!("empty transcription, nothing to send");
            return Ok(());
        }

        session.send(&text).await
    }
}
