//! Microphone capture via cpal.
//!
//! Records at the device's native configuration, mixes to mono, and
//! downsamples to the configured rate (default 16kHz) for transcription.
//! The cpal stream lives on a dedicated thread; stopping joins the thread,
//! which drops the stream and releases the device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::JoinHandle;

use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info};

use super::{AudioCapture, AudioClip};
use crate::config::AudioConfig;
use crate::error::{ChatError, Result};

/// Samples and any stream failure, shared with the capture thread.
#[derive(Default)]
struct CaptureShared {
    samples: Vec<f32>,
    error: Option<String>,
}

/// A running capture: its thread and the handles to control it.
struct CaptureWorker {
    stop: Arc<AtomicBool>,
    shared: Arc<Mutex<CaptureShared>>,
    handle: JoinHandle<()>,
}

/// Microphone capture via cpal.
pub struct CpalCapture {
    input_device: Option<String>,
    target_sample_rate: u32,
    worker: Option<CaptureWorker>,
}

impl CpalCapture {
    /// Create a capture instance; the device is opened on `start`.
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            input_device: config.input_device.clone(),
            target_sample_rate: config.input_sample_rate,
            worker: None,
        }
    }

    /// List available input devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_input_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| ChatError::Capture(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

impl AudioCapture for CpalCapture {
    fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(ChatError::Capture("recording already in progress".into()));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(Mutex::new(CaptureShared::default()));
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(), String>>();

        let device_name = self.input_device.clone();
        let target_rate = self.target_sample_rate;
        let thread_stop = Arc::clone(&stop);
        let thread_shared = Arc::clone(&shared);

        let handle = std::thread::spawn(move || {
            capture_thread(device_name, target_rate, thread_shared, thread_stop, ready_tx);
        });

        // The thread reports whether the stream came up.
        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(CaptureWorker {
                    stop,
                    shared,
                    handle,
                });
                Ok(())
            }
            Ok(Err(msg)) => {
                let _ = handle.join();
                Err(ChatError::Capture(msg))
            }
            Err(_) => {
                let _ = handle.join();
                Err(ChatError::Capture("capture thread exited early".into()))
            }
        }
    }

    fn stop(&mut self) -> Result<AudioClip> {
        let worker = self
            .worker
            .take()
            .ok_or_else(|| ChatError::Capture("no recording in progress".into()))?;

        worker.stop.store(true, Ordering::Release);
        if worker.handle.join().is_err() {
            return Err(ChatError::Capture("capture thread panicked".into()));
        }

        // Thread has exited: the stream is dropped and the device released.
        let mut shared = worker
            .shared
            .lock()
            .map_err(|e| ChatError::Capture(format!("capture buffer lock poisoned: {e}")))?;

        if let Some(msg) = shared.error.take() {
            return Err(ChatError::Capture(msg));
        }

        let samples = std::mem::take(&mut shared.samples);
        info!(
            "capture stopped: {} samples at {}Hz",
            samples.len(),
            self.target_sample_rate
        );
        Ok(AudioClip::new(samples, self.target_sample_rate))
    }
}

/// Owns the cpal input stream for the duration of one recording.
fn capture_thread(
    device_name: Option<String>,
    target_rate: u32,
    shared: Arc<Mutex<CaptureShared>>,
    stop: Arc<AtomicBool>,
    ready_tx: mpsc::Sender<std::result::Result<(), String>>,
) {
    let host = cpal::default_host();

    let device = match &device_name {
        Some(name) => {
            let found = host.input_devices().ok().and_then(|mut devices| {
                devices.find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
            });
            match found {
                Some(device) => device,
                None => {
                    let _ = ready_tx.send(Err(format!("input device '{name}' not found")));
                    return;
                }
            }
        }
        None => match host.default_input_device() {
            Some(device) => device,
            None => {
                let _ = ready_tx.send(Err("no default input device".into()));
                return;
            }
        },
    };

    let default_config = match device.default_input_config() {
        Ok(config) => config,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("no default input config: {e}")));
            return;
        }
    };

    let native_rate = default_config.sample_rate();
    let native_channels = default_config.channels();
    let stream_config = StreamConfig {
        channels: native_channels,
        sample_rate: native_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    debug!(
        "native input config: {}Hz, {} channels (target {}Hz)",
        native_rate, native_channels, target_rate
    );

    let callback_shared = Arc::clone(&shared);
    let error_shared = Arc::clone(&shared);

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _info: &cpal::InputCallbackInfo| {
            let mono = if native_channels > 1 {
                to_mono(data, native_channels)
            } else {
                data.to_vec()
            };
            let samples = if native_rate != target_rate {
                downsample(&mono, native_rate, target_rate)
            } else {
                mono
            };
            if let Ok(mut shared) = callback_shared.lock() {
                shared.samples.extend_from_slice(&samples);
            }
        },
        move |err| {
            error!("audio input stream error: {err}");
            if let Ok(mut shared) = error_shared.lock() {
                shared.error.get_or_insert_with(|| err.to_string());
            }
        },
        None,
    );

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("failed to build input stream: {e}")));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(format!("failed to start input stream: {e}")));
        return;
    }

    let _ = ready_tx.send(Ok(()));
    info!("audio capture started");

    while !stop.load(Ordering::Acquire) {
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    drop(stream);
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Linear-interpolation downsampler.
///
/// Sufficient quality for speech (48kHz → 16kHz); speech energy sits
/// below 8kHz, so no anti-alias filter is needed.
fn downsample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = src_rate as f64 / dst_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            samples[idx] as f64 * (1.0 - frac) + samples[idx + 1] as f64 * frac
        } else {
            samples[idx.min(samples.len() - 1)] as f64
        };

        output.push(sample as f32);
    }

    output
}
