//! File-backed audio: a WAV file stands in for the microphone and the model's
//! speech is rendered into a WAV file instead of a speaker.

use async_trait::async_trait;
use interview_audio::resample::FrameResampler;
use interview_audio::{CAPTURE_FRAME_SIZE, LIVE_INPUT_SAMPLE_RATE, wav};
use interview_core::live::capture::{CaptureError, Microphone};
use interview_core::live::playback::Recording;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Streams a WAV file as capture frames at real-time pace, followed by some
/// silence so the endpoint notices the candidate stopped talking.
pub struct WavMicrophone {
    path: PathBuf,
    trailing_silence: Duration,
    task: Option<JoinHandle<()>>,
}

impl WavMicrophone {
    pub fn new(path: &Path, trailing_silence: Duration) -> Self {
        Self {
            path: path.to_path_buf(),
            trailing_silence,
            task: None,
        }
    }
}

/// Reads `path` and cuts it into live-rate frames, padding the last one.
pub fn load_frames(path: &Path, trailing_silence: Duration) -> Result<Vec<Vec<f32>>, CaptureError> {
    let (samples, rate) =
        wav::read_mono(path).map_err(|e| CaptureError::Unavailable(e.to_string()))?;
    let mut framer = FrameResampler::new(rate, LIVE_INPUT_SAMPLE_RATE, CAPTURE_FRAME_SIZE)
        .map_err(|e| CaptureError::Unavailable(e.to_string()))?;

    let silence_len = (trailing_silence.as_secs_f64() * LIVE_INPUT_SAMPLE_RATE as f64) as usize;
    let mut frames = framer
        .push(&samples)
        .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
    // Flush whatever the resampler is still holding.
    frames.extend(
        framer
            .push(&vec![0.0; silence_len + CAPTURE_FRAME_SIZE])
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?,
    );
    Ok(frames)
}

#[async_trait]
impl Microphone for WavMicrophone {
    async fn open(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, CaptureError> {
        self.close();
        let frames = load_frames(&self.path, self.trailing_silence)?;
        tracing::info!(
            "Streaming {} frames from {}",
            frames.len(),
            self.path.display()
        );

        let (tx, rx) = mpsc::channel(64);
        let frame_time =
            Duration::from_secs_f64(CAPTURE_FRAME_SIZE as f64 / LIVE_INPUT_SAMPLE_RATE as f64);
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_time);
            for frame in frames {
                ticker.tick().await;
                if tx.send(frame).await.is_err() {
                    return;
                }
            }
        }));
        Ok(rx)
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Writes what the model said to `path`.
pub fn save_recording(recording: &Recording, path: &Path) -> anyhow::Result<()> {
    let samples = recording.samples();
    wav::write_mono(path, &samples, recording.sample_rate())?;
    tracing::info!(
        "Wrote {:.1}s of interviewer audio to {}",
        samples.len() as f64 / recording.sample_rate() as f64,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn frames_are_fixed_size_and_padded_with_silence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("answer.wav");
        wav::write_mono(&path, &vec![0.25; 1_000], LIVE_INPUT_SAMPLE_RATE).unwrap();

        let frames = load_frames(&path, Duration::from_millis(160)).unwrap();
        assert!(frames.iter().all(|f| f.len() == CAPTURE_FRAME_SIZE));
        // 1000 samples of speech + 2560 of silence + one flush frame.
        assert_eq!(frames.len(), (1_000 + 2_560 + CAPTURE_FRAME_SIZE) / CAPTURE_FRAME_SIZE);
        assert!(frames.last().unwrap().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = load_frames(Path::new("/nonexistent/answer.wav"), Duration::ZERO).unwrap_err();
        assert!(matches!(err, CaptureError::Unavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn microphone_streams_every_frame_then_closes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("answer.wav");
        wav::write_mono(&path, &vec![0.1; 512], LIVE_INPUT_SAMPLE_RATE).unwrap();

        let mut mic = WavMicrophone::new(&path, Duration::ZERO);
        let mut rx = mic.open().await.unwrap();
        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }
}
