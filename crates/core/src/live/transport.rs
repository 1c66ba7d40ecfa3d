use crate::credentials::Credential;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to open live session: {0}")]
    Open(String),
    #[error("failed to send audio: {0}")]
    Send(String),
    #[error("live session is closed")]
    Closed,
}

/// What the client asks for when opening a voice session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSetup {
    pub system_instruction: String,
    pub audio_responses: bool,
    pub input_transcription: bool,
    pub output_transcription: bool,
}

impl LiveSetup {
    pub fn new(system_instruction: String) -> Self {
        Self {
            system_instruction,
            audio_responses: true,
            input_transcription: true,
            output_transcription: true,
        }
    }
}

/// Everything a voice endpoint can tell the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Opened,
    /// Recognized speech from the candidate.
    InputTranscript(String),
    /// Text of what the model is saying.
    OutputTranscript(String),
    Audio { samples: Vec<f32>, sample_rate: u32 },
    /// The candidate started talking over the model.
    Interrupted,
    TurnComplete,
    Error(String),
    Closed { code: Option<u16>, reason: String },
}

/// Sending half of an open voice session.
#[async_trait]
pub trait AudioUplink: Send {
    async fn send_audio(&mut self, pcm: Vec<i16>, sample_rate: u32) -> Result<(), TransportError>;

    async fn close(&mut self);
}

pub struct LiveConnection {
    pub uplink: Box<dyn AudioUplink>,
    pub events: mpsc::Receiver<LiveEvent>,
}

/// Opens voice sessions against some streaming endpoint.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn open(
        &self,
        credential: &Credential,
        setup: LiveSetup,
    ) -> Result<LiveConnection, TransportError>;
}
