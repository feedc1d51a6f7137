//! Speaker playback via cpal.
//!
//! Non-blocking: `play` hands the clip to a dedicated thread that owns the
//! output stream and returns immediately. `stop` (or starting another
//! clip) signals the thread, which drops the stream and exits. A shared
//! flag reports whether playback is still running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::JoinHandle;

use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use super::{AudioClip, AudioPlayback};
use crate::error::{ChatError, Result};

/// Position tracking for the output callback.
struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
}

/// A running playback: its thread and the stop handle.
struct PlaybackWorker {
    stop: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Speaker playback via cpal.
pub struct CpalPlayback {
    output_device: Option<String>,
    worker: Option<PlaybackWorker>,
}

impl CpalPlayback {
    /// Create a playback instance; the device is opened per clip.
    pub fn new(output_device: Option<String>) -> Self {
        Self {
            output_device,
            worker: None,
        }
    }

    /// List available output devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| ChatError::Synthesis(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

impl AudioPlayback for CpalPlayback {
    fn play(&mut self, clip: &AudioClip) -> Result<()> {
        // Single concurrent owner: any previous clip stops first.
        self.stop();

        let stop = Arc::new(AtomicBool::new(false));
        let active = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(), String>>();

        let device_name = self.output_device.clone();
        let samples = clip.samples.clone();
        let sample_rate = clip.sample_rate;
        let thread_stop = Arc::clone(&stop);
        let thread_active = Arc::clone(&active);

        let handle = std::thread::spawn(move || {
            playback_thread(
                device_name,
                samples,
                sample_rate,
                thread_stop,
                thread_active,
                ready_tx,
            );
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(PlaybackWorker {
                    stop,
                    active,
                    handle,
                });
                Ok(())
            }
            Ok(Err(msg)) => {
                let _ = handle.join();
                Err(ChatError::Synthesis(msg))
            }
            Err(_) => {
                let _ = handle.join();
                Err(ChatError::Synthesis("playback thread exited early".into()))
            }
        }
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::Release);
            let _ = worker.handle.join();
        }
    }

    fn is_playing(&self) -> bool {
        self.worker
            .as_ref()
            .map(|w| w.active.load(Ordering::Acquire))
            .unwrap_or(false)
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Owns the cpal output stream until the clip ends or stop is signalled.
fn playback_thread(
    device_name: Option<String>,
    samples: Vec<f32>,
    sample_rate: u32,
    stop: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    ready_tx: mpsc::Sender<std::result::Result<(), String>>,
) {
    // Whatever the exit path, report idle on the way out.
    let _idle_guard = IdleGuard(active);

    let host = cpal::default_host();

    let device = match &device_name {
        Some(name) => {
            let found = host.output_devices().ok().and_then(|mut devices| {
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
                    let _ = ready_tx.send(Err(format!("output device '{name}' not found")));
                    return;
                }
            }
        }
        None => match host.default_output_device() {
            Some(device) => device,
            None => {
                let _ = ready_tx.send(Err("no default output device".into()));
                return;
            }
        },
    };

    let stream_config = StreamConfig {
        channels: 1,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let buffer = Arc::new(Mutex::new(PlaybackBuffer {
        samples,
        position: 0,
    }));
    let finished = Arc::new(AtomicBool::new(false));
    let callback_buffer = Arc::clone(&buffer);
    let callback_finished = Arc::clone(&finished);

    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
            let mut buf = match callback_buffer.lock() {
                Ok(b) => b,
                Err(_) => return,
            };
            for sample in data.iter_mut() {
                if buf.position < buf.samples.len() {
                    *sample = buf.samples[buf.position];
                    buf.position += 1;
                } else {
                    *sample = 0.0;
                    callback_finished.store(true, Ordering::Release);
                }
            }
        },
        move |err| {
            error!("audio output stream error: {err}");
        },
        None,
    );

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("failed to build output stream: {e}")));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(format!("failed to start output stream: {e}")));
        return;
    }

    let _ = ready_tx.send(Ok(()));
    info!("playback started at {sample_rate}Hz");

    while !stop.load(Ordering::Acquire) && !finished.load(Ordering::Acquire) {
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    drop(stream);
}

/// Clears the `active` flag when the playback thread exits.
struct IdleGuard(Arc<AtomicBool>);

impl Drop for IdleGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_playback_reports_not_playing() {
        let playback = CpalPlayback::new(None);
        assert!(!playback.is_playing());
    }

    #[test]
    fn stop_when_idle_is_a_no_op() {
        let mut playback = CpalPlayback::new(None);
        playback.stop();
        assert!(!playback.is_playing());
    }

    #[test]
    fn idle_guard_clears_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        {
            let _guard = IdleGuard(Arc::clone(&flag));
        }
        assert!(!flag.load(Ordering::Acquire));
    }
}
