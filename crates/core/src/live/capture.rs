use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;

/// Publish a volume sample every this many captured frames.
pub const VOLUME_FRAME_INTERVAL: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),
    #[error("microphone unavailable: {0}")]
    Unavailable(String),
}

/// Recording is tracked apart from the connection so a microphone problem
/// never changes the connection status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Off,
    Requesting,
    Active,
    Failed(String),
}

/// A source of mono 16 kHz frames of `CAPTURE_FRAME_SIZE` samples.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Microphone: Send {
    async fn open(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, CaptureError>;

    /// Releases the device. Safe to call when not open.
    fn close(&mut self);
}

/// Samples the RMS of every Nth frame for level meters.
#[derive(Debug, Default)]
pub struct VolumeMeter {
    frames: u64,
}

impl VolumeMeter {
    pub fn observe(&mut self, frame: &[f32]) -> Option<f32> {
        self.frames += 1;
        (self.frames % VOLUME_FRAME_INTERVAL == 0).then(|| interview_audio::pcm::rms(frame))
    }

    pub fn reset(&mut self) {
        self.frames = 0;
    }
}
