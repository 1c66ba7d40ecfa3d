//! The live voice session adapter.
//!
//! [`LiveSession`] bridges a [`Microphone`] and an [`AudioOutput`] to a
//! streaming voice endpoint reached through a [`LiveConnector`]. One task owns
//! the session and drives it with [`LiveSession::pump`]; everything else
//! observes it through the accessors and the watch channels.

pub mod capture;
pub mod playback;
pub mod transcript;
pub mod transport;

use crate::credentials::CredentialProvider;
use crate::model::{SessionConfig, Speaker, TranscriptTurn};
use crate::prompt;
use capture::{Microphone, RecordingState, VolumeMeter};
use interview_audio::LIVE_INPUT_SAMPLE_RATE;
use playback::{AudioOutput, PlaybackScheduler};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use transcript::{Transcript, TranscriptLine};
use transport::{AudioUplink, LiveConnector, LiveEvent, LiveSetup};

/// Connection status. `Error` is left by calling [`LiveSession::connect`]
/// again or through [`LiveSession::disconnect`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LiveStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Error(String),
}

struct EventStream {
    epoch: u64,
    rx: mpsc::Receiver<LiveEvent>,
}

enum Next {
    Event(u64, Option<LiveEvent>),
    Frame(Option<Vec<f32>>),
}

pub struct LiveSession {
    connector: Arc<dyn LiveConnector>,
    credentials: Arc<CredentialProvider>,
    microphone: Box<dyn Microphone>,
    playback: PlaybackScheduler,
    transcript: Transcript,
    status: watch::Sender<LiveStatus>,
    recording: RecordingState,
    muted: bool,
    // Bumped on every connect and disconnect.
    epoch: u64,
    uplink: Option<Box<dyn AudioUplink>>,
    events: Option<EventStream>,
    frames: Option<mpsc::Receiver<Vec<f32>>>,
    meter: VolumeMeter,
    volume: watch::Sender<f32>,
    sink: Option<mpsc::UnboundedSender<TranscriptTurn>>,
}

impl LiveSession {
    pub fn new(
        connector: Arc<dyn LiveConnector>,
        credentials: Arc<CredentialProvider>,
        microphone: Box<dyn Microphone>,
        output: Box<dyn AudioOutput>,
    ) -> Self {
        Self {
            connector,
            credentials,
            microphone,
            playback: PlaybackScheduler::new(output),
            transcript: Transcript::new(),
            status: watch::Sender::new(LiveStatus::Idle),
            recording: RecordingState::Off,
            muted: false,
            epoch: 0,
            uplink: None,
            events: None,
            frames: None,
            meter: VolumeMeter::default(),
            volume: watch::Sender::new(0.0),
            sink: None,
        }
    }

    /// Forwards every transcript fragment, e.g. to the session store.
    pub fn with_transcript_sink(mut self, sink: mpsc::UnboundedSender<TranscriptTurn>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn status(&self) -> LiveStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<LiveStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_volume(&self) -> watch::Receiver<f32> {
        self.volume.subscribe()
    }

    pub fn recording_state(&self) -> &RecordingState {
        &self.recording
    }

    pub fn is_recording(&self) -> bool {
        self.recording == RecordingState::Active
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn transcript(&self) -> &[TranscriptLine] {
        self.transcript.lines()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn playback(&self) -> &PlaybackScheduler {
        &self.playback
    }

    fn set_status(&self, status: LiveStatus) {
        tracing::debug!("Live status -> {:?}", status);
        self.status.send_replace(status);
    }

    /// Opens a voice session for `config`. Failures land in the status
    /// rather than being returned; calling this again from `Error` retries.
    pub async fn connect(&mut self, config: &SessionConfig, profile: Option<&str>) {
        match self.status() {
            LiveStatus::Idle => {}
            LiveStatus::Error(reason) => {
                tracing::info!("Retrying live session after: {}", reason);
                self.stop_recording();
                self.events = None;
                if let Some(mut uplink) = self.uplink.take() {
                    uplink.close().await;
                }
            }
            status => {
                tracing::warn!("connect() ignored, session is {:?}", status);
                return;
            }
        }
        self.epoch += 1;
        self.set_status(LiveStatus::Connecting);

        let credential = match self.credentials.resolve().await {
            Ok(credential) => credential,
            Err(e) => {
                self.fail(e.to_string()).await;
                return;
            }
        };

        let setup = LiveSetup::new(prompt::system_instruction(config, profile));
        match self.connector.open(&credential, setup).await {
            Ok(connection) => {
                tracing::info!("Live session opening (epoch {})", self.epoch);
                self.uplink = Some(connection.uplink);
                self.events = Some(EventStream {
                    epoch: self.epoch,
                    rx: connection.events,
                });
            }
            Err(e) => self.fail(e.to_string()).await,
        }
    }

    /// Tears everything down and returns to `Idle` from any state.
    pub async fn disconnect(&mut self) {
        self.epoch += 1;
        self.stop_recording();
        self.events = None;
        if let Some(mut uplink) = self.uplink.take() {
            uplink.close().await;
        }
        self.playback.interrupt();
        self.transcript.clear();
        self.set_status(LiveStatus::Idle);
        tracing::info!("Live session disconnected");
    }

    pub async fn start_recording(&mut self) {
        if self.frames.is_some() {
            return;
        }
        self.recording = RecordingState::Requesting;
        match self.microphone.open().await {
            Ok(frames) => {
                tracing::info!("Microphone active");
                self.meter.reset();
                self.frames = Some(frames);
                self.recording = RecordingState::Active;
            }
            Err(e) => {
                tracing::warn!("Microphone failed: {}", e);
                self.recording = RecordingState::Failed(e.to_string());
            }
        }
    }

    pub fn stop_recording(&mut self) {
        if self.frames.take().is_some() {
            self.microphone.close();
        }
        self.recording = RecordingState::Off;
        self.volume.send_replace(0.0);
    }

    pub async fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if muted {
            self.stop_recording();
        } else if self.status() == LiveStatus::Connected {
            self.start_recording().await;
        }
    }

    /// Waits for the next transport event or captured frame and applies it.
    /// Returns `false` when there is nothing left to wait on.
    pub async fn pump(&mut self) -> bool {
        let next = match (self.events.as_mut(), self.frames.as_mut()) {
            (None, None) => return false,
            (Some(events), None) => Next::Event(events.epoch, events.rx.recv().await),
            (None, Some(frames)) => Next::Frame(frames.recv().await),
            (Some(events), Some(frames)) => {
                let epoch = events.epoch;
                tokio::select! {
                    event = events.rx.recv() => Next::Event(epoch, event),
                    frame = frames.recv() => Next::Frame(frame),
                }
            }
        };

        match next {
            Next::Event(epoch, Some(event)) => self.handle_event(epoch, event).await,
            Next::Event(epoch, None) => {
                if epoch == self.epoch {
                    self.events = None;
                    if matches!(self.status(), LiveStatus::Connecting | LiveStatus::Connected) {
                        self.fail("Connection closed".into()).await;
                    }
                }
            }
            Next::Frame(Some(frame)) => self.handle_frame(frame).await,
            Next::Frame(None) => {
                tracing::info!("Capture ended");
                self.stop_recording();
            }
        }
        true
    }

    /// Applies one event produced by the connection opened in `epoch`.
    /// Events from any other epoch are dropped.
    pub async fn handle_event(&mut self, epoch: u64, event: LiveEvent) {
        if epoch != self.epoch {
            tracing::debug!("Dropping stale event from epoch {}: {:?}", epoch, event);
            return;
        }
        self.playback.reap();

        match event {
            LiveEvent::Opened => {
                if self.status() == LiveStatus::Connecting {
                    self.set_status(LiveStatus::Connected);
                    if !self.muted {
                        self.start_recording().await;
                    }
                }
            }
            LiveEvent::InputTranscript(text) => self.push_fragment(Speaker::User, &text),
            LiveEvent::OutputTranscript(text) => self.push_fragment(Speaker::Model, &text),
            LiveEvent::Audio {
                samples,
                sample_rate,
            } => {
                self.playback.enqueue(samples, sample_rate);
            }
            LiveEvent::Interrupted => {
                self.playback.interrupt();
            }
            LiveEvent::TurnComplete => tracing::debug!("Model turn complete"),
            LiveEvent::Error(message) => self.fail(message).await,
            LiveEvent::Closed { code, reason } => {
                let reason = if reason.is_empty() {
                    "no reason given".to_string()
                } else {
                    reason
                };
                let message = match code {
                    Some(code) => format!("Closed: {reason} (code {code})"),
                    None => format!("Closed: {reason}"),
                };
                self.fail(message).await;
            }
        }
    }

    fn push_fragment(&mut self, speaker: Speaker, text: &str) {
        if text.is_empty() {
            return;
        }
        self.transcript.push(speaker, text);
        if let Some(sink) = &self.sink {
            if sink.send(TranscriptTurn::now(speaker, text)).is_err() {
                tracing::warn!("Transcript sink dropped, fragments are no longer forwarded");
                self.sink = None;
            }
        }
    }

    async fn handle_frame(&mut self, frame: Vec<f32>) {
        if let Some(level) = self.meter.observe(&frame) {
            self.volume.send_replace(level);
        }
        let Some(uplink) = self.uplink.as_mut() else {
            return;
        };
        let pcm = interview_audio::pcm::f32_to_i16(&frame);
        if let Err(e) = uplink.send_audio(pcm, LIVE_INPUT_SAMPLE_RATE).await {
            tracing::warn!("Failed to send audio frame: {}", e);
        }
    }

    /// Moves to the terminal error state. The transcript is kept.
    async fn fail(&mut self, reason: String) {
        tracing::error!("Live session failed: {}", reason);
        self.stop_recording();
        self.events = None;
        if let Some(mut uplink) = self.uplink.take() {
            uplink.close().await;
        }
        self.set_status(LiveStatus::Error(reason));
    }
}
