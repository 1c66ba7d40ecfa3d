use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use gemini_live::types::{AudioTranscriptionConfig, Modality, ServerMessage, Setup};
use gemini_live::{Auth, Incoming, LiveReader, LiveWriter};
use interview_audio::LIVE_OUTPUT_SAMPLE_RATE;
use interview_audio::pcm::{ToBinary, decode_base64};
use interview_core::credentials::{Credential, CredentialKind};
use interview_core::live::transport::{
    AudioUplink, LiveConnection, LiveConnector, LiveEvent, LiveSetup, TransportError,
};
use tokio::sync::mpsc;

/// Opens live sessions on the Gemini Live WebSocket endpoint.
pub struct GeminiLiveConnector {
    model: String,
    voice: String,
    endpoint: Option<String>,
}

impl GeminiLiveConnector {
    pub fn new(model: &str, voice: &str) -> Self {
        Self {
            model: model.to_string(),
            voice: voice.to_string(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    fn build_setup(&self, setup: &LiveSetup) -> Setup {
        let mut wire = Setup::new(&self.model).with_system_instruction(&setup.system_instruction);
        if setup.audio_responses {
            wire = wire.with_voice(&self.voice);
        } else {
            wire.generation_config.response_modalities = vec![Modality::Text];
        }
        wire.input_audio_transcription = setup
            .input_transcription
            .then(AudioTranscriptionConfig::default);
        wire.output_audio_transcription = setup
            .output_transcription
            .then(AudioTranscriptionConfig::default);
        wire
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn open(
        &self,
        credential: &Credential,
        setup: LiveSetup,
    ) -> Result<LiveConnection, TransportError> {
        let auth = match credential.kind {
            CredentialKind::ApiKey => Auth::ApiKey(credential.secret.clone()),
            CredentialKind::Ephemeral => Auth::EphemeralToken(credential.secret.clone()),
        };
        let mut config = gemini_live::Config::new(auth);
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint);
        }

        let client = gemini_live::connect(&config)
            .await
            .map_err(|e| TransportError::Open(format!("{e:#}")))?;
        let (mut writer, reader) = client.into_split();
        writer
            .send_setup(self.build_setup(&setup))
            .await
            .map_err(|e| TransportError::Open(format!("{e:#}")))?;
        tracing::info!("Sent live setup for model {}", self.model);

        let (tx, rx) = mpsc::channel(128);
        tokio::spawn(forward_events(reader, tx));

        Ok(LiveConnection {
            uplink: Box::new(GeminiUplink { writer }),
            events: rx,
        })
    }
}

struct GeminiUplink {
    writer: LiveWriter,
}

#[async_trait]
impl AudioUplink for GeminiUplink {
    async fn send_audio(&mut self, pcm: Vec<i16>, sample_rate: u32) -> Result<(), TransportError> {
        let data = general_purpose::STANDARD.encode(pcm.to_binary());
        self.writer
            .send_audio(&format!("audio/pcm;rate={sample_rate}"), data)
            .await
            .map_err(|e| TransportError::Send(format!("{e:#}")))
    }

    async fn close(&mut self) {
        if let Err(e) = self.writer.close().await {
            tracing::debug!("Closing live socket: {:#}", e);
        }
    }
}

/// Reads the socket until it ends, translating each message for the session.
async fn forward_events(mut reader: LiveReader, tx: mpsc::Sender<LiveEvent>) {
    loop {
        let events = match reader.next_message().await {
            Ok(Some(Incoming::Message(message))) => translate(message),
            Ok(Some(Incoming::Closed { code, reason })) => vec![LiveEvent::Closed { code, reason }],
            Ok(None) => vec![LiveEvent::Closed {
                code: None,
                reason: "connection ended".to_string(),
            }],
            Err(e) => vec![LiveEvent::Error(format!("{e:#}"))],
        };
        let last = events
            .last()
            .is_some_and(|e| matches!(e, LiveEvent::Closed { .. } | LiveEvent::Error(_)));
        for event in events {
            if tx.send(event).await.is_err() {
                tracing::debug!("Live session dropped its event receiver");
                return;
            }
        }
        if last {
            return;
        }
    }
}

/// `audio/pcm;rate=24000` -> 24000.
fn rate_from_mime(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok())
}

/// One server message can carry several things at once; they come out in
/// the order the session should apply them.
fn translate(message: ServerMessage) -> Vec<LiveEvent> {
    let mut events = Vec::new();
    if message.setup_complete.is_some() {
        events.push(LiveEvent::Opened);
    }
    if let Some(go_away) = &message.go_away {
        tracing::warn!("Server is going away, time left: {:?}", go_away.time_left);
    }

    let Some(content) = message.server_content else {
        return events;
    };
    if let Some(text) = content.input_transcription.as_ref().and_then(|t| t.text.clone()) {
        events.push(LiveEvent::InputTranscript(text));
    }
    if let Some(text) = content.output_transcription.as_ref().and_then(|t| t.text.clone()) {
        events.push(LiveEvent::OutputTranscript(text));
    }
    for blob in content.audio_blobs() {
        match decode_base64(&blob.data) {
            Ok(samples) => events.push(LiveEvent::Audio {
                samples,
                sample_rate: rate_from_mime(&blob.mime_type).unwrap_or(LIVE_OUTPUT_SAMPLE_RATE),
            }),
            Err(e) => tracing::warn!("Dropping undecodable audio chunk: {}", e),
        }
    }
    // Cuts whatever is scheduled, including this message's own audio.
    if content.interrupted == Some(true) {
        events.push(LiveEvent::Interrupted);
    }
    if content.turn_complete == Some(true) {
        events.push(LiveEvent::TurnComplete);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(raw: &str) -> ServerMessage {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn setup_complete_opens_the_session() {
        assert_eq!(translate(message(r#"{"setupComplete":{}}"#)), vec![LiveEvent::Opened]);
    }

    #[test]
    fn server_content_is_translated_in_order() {
        // "AAAAQA==" is two PCM16 samples: 0 and 16384.
        let events = translate(message(
            r#"{"serverContent":{
                "interrupted":true,
                "outputTranscription":{"text":"Tell me"},
                "modelTurn":{"parts":[{"inlineData":{"mimeType":"audio/pcm;rate=22050","data":"AAAAQA=="}}]},
                "turnComplete":true
            }}"#,
        ));
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], LiveEvent::OutputTranscript("Tell me".into()));
        match &events[1] {
            LiveEvent::Audio {
                samples,
                sample_rate,
            } => {
                assert_eq!(*sample_rate, 22_050);
                assert_eq!(samples, &vec![0.0, 0.5]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(events[2], LiveEvent::Interrupted);
        assert_eq!(events[3], LiveEvent::TurnComplete);
    }

    #[test]
    fn user_speech_becomes_input_transcript() {
        let events = translate(message(r#"{"serverContent":{"inputTranscription":{"text":"I led"}}}"#));
        assert_eq!(events, vec![LiveEvent::InputTranscript("I led".into())]);
    }

    #[test]
    fn mime_rate_falls_back_when_absent() {
        assert_eq!(rate_from_mime("audio/pcm;rate=24000"), Some(24_000));
        assert_eq!(rate_from_mime("audio/pcm"), None);
    }

    #[test]
    fn setup_carries_voice_and_transcriptions() {
        let connector = GeminiLiveConnector::new("gemini-live-test", "Orus");
        let wire = connector.build_setup(&LiveSetup::new("be strict".into()));
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["model"], "models/gemini-live-test");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be strict");
        assert_eq!(
            json["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Orus"
        );
        assert!(json["inputAudioTranscription"].is_object());
        assert!(json["outputAudioTranscription"].is_object());
    }
}
