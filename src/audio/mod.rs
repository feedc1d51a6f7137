//! Audio capture and playback seams over cpal.
//!
//! The voice controllers talk to [`AudioCapture`] and [`AudioPlayback`]
//! rather than to cpal directly, so the state machines are testable with
//! fakes. The cpal-backed implementations live in [`capture`] and
//! [`playback`]; each owns its stream on a dedicated thread because cpal
//! streams are not `Send`.

pub mod capture;
pub mod playback;

pub use capture::CpalCapture;
pub use playback::CpalPlayback;

use crate::error::Result;

/// A chunk of mono PCM audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Samples per second.
    pub sample_rate: u32,
}

impl AudioClip {
    /// Create a clip from samples at the given rate.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Whether the clip holds no audio.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Microphone capture with deterministic device release.
///
/// One recording at a time: `start` acquires the device, `stop` releases
/// it and returns whatever was captured. `stop` must release the device
/// regardless of outcome.
pub trait AudioCapture: Send {
    /// Acquire the device and begin recording.
    ///
    /// # Errors
    ///
    /// Fails if the device cannot be opened or a recording is already
    /// in progress.
    fn start(&mut self) -> Result<()>;

    /// Stop recording, release the device, and return the captured clip.
    ///
    /// # Errors
    ///
    /// Fails if no recording is in progress or the capture stream failed;
    /// the device is released either way.
    fn stop(&mut self) -> Result<AudioClip>;
}

/// Speaker playback with a single concurrent owner.
///
/// Starting playback while another clip is playing must stop the old
/// clip first.
pub trait AudioPlayback: Send {
    /// Start playing the clip without blocking.
    ///
    /// # Errors
    ///
    /// Fails if the output device cannot be opened.
    fn play(&mut self, clip: &AudioClip) -> Result<()>;

    /// Stop any current playback. No-op when idle.
    fn stop(&mut self);

    /// Whether a clip is still playing.
    fn is_playing(&self) -> bool;
}
