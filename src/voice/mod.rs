//! Voice side channels: push-to-talk capture and spoken replies.
//!
//! - [`capture`] — the `Idle → Recording → Transcribing` state machine
//! - [`playback`] — the `Idle → Generating → Playing` state machine with
//!   the auto-speak rule
//! - [`transcribe`] / [`synthesize`] — the HTTP clients behind them
//!
//! Audio travels to and from the HTTP endpoints as 16-bit PCM WAV,
//! framed with `hound`.

pub mod capture;
pub mod playback;
pub mod synthesize;
pub mod transcribe;

pub use capture::{CaptureState, VoiceCaptureController};
pub use playback::{PlaybackController, PlaybackState};
pub use synthesize::{HttpSynthesis, SpeechSynthesis};
pub use transcribe::{HttpTranscription, TranscriptionClient};

use std::io::Cursor;

use crate::audio::AudioClip;
use crate::error::{ChatError, Result};

/// Encode a mono clip as a 16-bit PCM WAV body.
pub(crate) fn encode_wav(clip: &AudioClip) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)
        .map_err(|e| ChatError::Capture(format!("WAV encode failed: {e}")))?;
    for &sample in &clip.samples {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer
            .write_sample(value)
            .map_err(|e| ChatError::Capture(format!("WAV encode failed: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| ChatError::Capture(format!("WAV encode failed: {e}")))?;
    Ok(cursor.into_inner())
}

/// Decode a 16-bit PCM WAV body to a mono clip.
///
/// Multi-channel audio is mixed down by averaging.
///
/// # Errors
///
/// Returns [`ChatError::Decode`] for truncated or non-16-bit-PCM bodies.
pub(crate) fn decode_wav(bytes: &[u8]) -> Result<AudioClip> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| ChatError::Decode(format!("not a WAV body: {e}")))?;

    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(ChatError::Decode(format!(
            "unsupported WAV format ({:?} at {} bits)",
            spec.sample_format, spec.bits_per_sample
        )));
    }
    let channels = usize::from(spec.channels);
    if channels == 0 {
        return Err(ChatError::Decode("WAV body has zero channels".into()));
    }

    let raw = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ChatError::Decode(format!("truncated WAV body: {e}")))?;

    let samples = raw
        .chunks_exact(channels)
        .map(|frame| {
            frame
                .iter()
                .map(|&s| f32::from(s) / f32::from(i16::MAX))
                .sum::<f32>()
                / channels as f32
        })
        .collect();

    Ok(AudioClip::new(samples, spec.sample_rate))
}
