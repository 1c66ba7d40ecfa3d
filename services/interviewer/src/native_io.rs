//! Sound-card audio through cpal.
//!
//! cpal streams are not `Send`, so each one lives on its own thread and is
//! dropped when that thread is told to stop.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use interview_audio::pcm::downmix;
use interview_audio::resample::{FrameResampler, convert};
use interview_audio::{CAPTURE_FRAME_SIZE, LIVE_INPUT_SAMPLE_RATE, device};
use interview_core::live::capture::{CaptureError, Microphone};
use interview_core::live::playback::{AudioOutput, PlaybackId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, mpsc as std_mpsc};
use tokio::sync::{mpsc, oneshot};

/// Frames per device callback.
const DEVICE_BUFFER_FRAMES: u32 = 1024;

fn build_error(e: impl std::fmt::Display) -> CaptureError {
    let message = e.to_string();
    if message.to_lowercase().contains("permission") {
        CaptureError::PermissionDenied(message)
    } else {
        CaptureError::Unavailable(message)
    }
}

/// The default (or named) input device.
pub struct CpalMicrophone {
    device_name: Option<String>,
    stop: Option<std_mpsc::Sender<()>>,
}

impl CpalMicrophone {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            stop: None,
        }
    }
}

fn run_input(
    device_name: Option<String>,
    frames: mpsc::Sender<Vec<f32>>,
    ready: oneshot::Sender<Result<(), CaptureError>>,
    stop: std_mpsc::Receiver<()>,
) {
    let started = (|| -> Result<cpal::Stream, CaptureError> {
        let input = device::get_or_default_input(device_name.as_deref()).map_err(build_error)?;
        tracing::info!("Using input device: {:?}", input.name().ok());
        let default = input.default_input_config().map_err(build_error)?;
        let config = StreamConfig {
            channels: default.channels(),
            sample_rate: default.sample_rate(),
            buffer_size: cpal::BufferSize::Fixed(FrameCount::from(DEVICE_BUFFER_FRAMES)),
        };
        let channels = config.channels as usize;
        let mut framer =
            FrameResampler::new(config.sample_rate.0, LIVE_INPUT_SAMPLE_RATE, CAPTURE_FRAME_SIZE)
                .map_err(build_error)?;

        let stream = input
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = downmix(data, channels);
                    match framer.push(&mono) {
                        Ok(ready) => {
                            for frame in ready {
                                if let Err(e) = frames.try_send(frame) {
                                    tracing::warn!("Dropping captured frame: {}", e);
                                }
                            }
                        }
                        Err(e) => tracing::warn!("Failed to resample captured audio: {}", e),
                    }
                },
                move |err| tracing::error!("An error occurred on input stream: {}", err),
                None,
            )
            .map_err(build_error)?;
        stream.play().map_err(build_error)?;
        Ok(stream)
    })();

    match started {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            // Blocks until close() or the microphone is dropped.
            let _ = stop.recv();
            drop(stream);
            tracing::debug!("Input stream stopped");
        }
        Err(e) => {
            let _ = ready.send(Err(e));
        }
    }
}

#[async_trait]
impl Microphone for CpalMicrophone {
    async fn open(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, CaptureError> {
        self.close();
        let (frames_tx, frames_rx) = mpsc::channel(256);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();
        let device_name = self.device_name.clone();
        std::thread::spawn(move || run_input(device_name, frames_tx, ready_tx, stop_rx));

        ready_rx
            .await
            .map_err(|_| CaptureError::Unavailable("input thread exited".into()))??;
        self.stop = Some(stop_tx);
        Ok(frames_rx)
    }

    fn close(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

struct Voice {
    start: u64,
    samples: Vec<f32>,
}

#[derive(Default)]
struct DeviceMix {
    // Frames handed to the device so far.
    played: u64,
    voices: HashMap<PlaybackId, Voice>,
    finished: Vec<PlaybackId>,
}

impl DeviceMix {
    fn render(&mut self, out: &mut [f32], channels: usize) {
        let frames = out.len() / channels.max(1);
        for (i, frame) in out.chunks_mut(channels.max(1)).enumerate() {
            let at = self.played + i as u64;
            let mut sample = 0.0;
            for voice in self.voices.values() {
                if let Some(offset) = at.checked_sub(voice.start) {
                    sample += voice.samples.get(offset as usize).copied().unwrap_or(0.0);
                }
            }
            frame.fill(sample.clamp(-1.0, 1.0));
        }
        self.played += frames as u64;

        let played = self.played;
        let done: Vec<PlaybackId> = self
            .voices
            .iter()
            .filter(|(_, v)| v.start + v.samples.len() as u64 <= played)
            .map(|(id, _)| *id)
            .collect();
        for id in done {
            self.voices.remove(&id);
            self.finished.push(id);
        }
    }
}

fn lock(mix: &Mutex<DeviceMix>) -> MutexGuard<'_, DeviceMix> {
    mix.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The default (or named) output device. Its clock is the number of frames
/// the device has consumed.
pub struct CpalOutput {
    mix: Arc<Mutex<DeviceMix>>,
    sample_rate: u32,
    stop: std_mpsc::Sender<()>,
}

impl CpalOutput {
    pub fn open(device_name: Option<&str>) -> anyhow::Result<Self> {
        let output = device::get_or_default_output(device_name)?;
        tracing::info!("Using output device: {:?}", output.name().ok());
        let default = output.default_output_config()?;
        let config = StreamConfig {
            channels: default.channels(),
            sample_rate: default.sample_rate(),
            buffer_size: cpal::BufferSize::Fixed(FrameCount::from(DEVICE_BUFFER_FRAMES)),
        };
        let sample_rate = config.sample_rate.0;
        let mix = Arc::new(Mutex::new(DeviceMix::default()));

        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<anyhow::Result<()>>();
        let shared = mix.clone();
        std::thread::spawn(move || {
            let channels = config.channels as usize;
            let built = output.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    lock(&shared).render(data, channels);
                },
                move |err| tracing::error!("An error occurred on output stream: {}", err),
                None,
            );
            let stream = match built {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(e.into()));
                return;
            }
            let _ = ready_tx.send(Ok(()));
            let _ = stop_rx.recv();
        });

        ready_rx.recv()??;
        Ok(Self {
            mix,
            sample_rate,
            stop: stop_tx,
        })
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.stop.send(());
    }
}

impl AudioOutput for CpalOutput {
    fn current_time(&self) -> f64 {
        lock(&self.mix).played as f64 / self.sample_rate as f64
    }

    fn start(&mut self, id: PlaybackId, at: f64, samples: Vec<f32>, sample_rate: u32) {
        let samples = match convert(&samples, sample_rate, self.sample_rate) {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!("Failed to resample model audio: {}", e);
                return;
            }
        };
        let start = (at.max(0.0) * self.sample_rate as f64).round() as u64;
        lock(&self.mix).voices.insert(id, Voice { start, samples });
    }

    fn stop(&mut self, id: PlaybackId) {
        lock(&self.mix).voices.remove(&id);
    }

    fn drain_finished(&mut self) -> Vec<PlaybackId> {
        std::mem::take(&mut lock(&self.mix).finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_plays_voices_at_their_start_frame() {
        let mut mix = DeviceMix::default();
        mix.voices.insert(1, Voice { start: 2, samples: vec![0.5, 0.5] });

        let mut out = vec![0.0; 8];
        mix.render(&mut out, 2);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 0.5]);
        assert_eq!(mix.played, 4);
        assert_eq!(mix.finished, vec![1]);
        assert!(mix.voices.is_empty());
    }
}
