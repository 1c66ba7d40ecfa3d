use crate::types::{Blob, RealtimeInput, RealtimeInputMessage, ServerMessage, Setup, SetupMessage};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

type WsWriter =
    futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsReader = futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

pub const LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const CONSTRAINED_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContentConstrained";

/// How the socket authenticates.
#[derive(Clone)]
pub enum Auth {
    /// A long-lived API key, sent as the `key` query parameter.
    ApiKey(SecretString),
    /// A short-lived token minted by a trusted backend.
    EphemeralToken(SecretString),
}

pub struct Config {
    endpoint: Option<String>,
    auth: Auth,
}

impl Config {
    pub fn new(auth: Auth) -> Self {
        Self {
            endpoint: None,
            auth,
        }
    }

    /// Overrides the socket URL, e.g. to point at a local test server.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    fn url(&self) -> String {
        match &self.auth {
            Auth::ApiKey(key) => format!(
                "{}?key={}",
                self.endpoint.as_deref().unwrap_or(LIVE_ENDPOINT),
                key.expose_secret()
            ),
            Auth::EphemeralToken(token) => format!(
                "{}?access_token={}",
                self.endpoint.as_deref().unwrap_or(CONSTRAINED_ENDPOINT),
                token.expose_secret()
            ),
        }
    }
}

/// What the reader yields besides protocol messages.
#[derive(Debug, Clone)]
pub enum Incoming {
    Message(ServerMessage),
    Closed { code: Option<u16>, reason: String },
}

/// A connected live socket, not yet split into halves.
pub struct GeminiLiveClient {
    write: LiveWriter,
    read: LiveReader,
}

/// Establishes a connection to the Gemini live endpoint.
pub async fn connect(config: &Config) -> Result<GeminiLiveClient> {
    let (ws_stream, _) = connect_async(config.url())
        .await
        .context("Failed to connect to Gemini live WebSocket")?;

    tracing::info!("Connected to Gemini live WebSocket.");
    let (write, read) = ws_stream.split();
    Ok(GeminiLiveClient {
        write: LiveWriter { write },
        read: LiveReader { read },
    })
}

impl GeminiLiveClient {
    pub async fn send_setup(&mut self, setup: Setup) -> Result<()> {
        self.write.send_setup(setup).await
    }

    pub fn into_split(self) -> (LiveWriter, LiveReader) {
        (self.write, self.read)
    }
}

/// Sending half of a live socket.
pub struct LiveWriter {
    write: WsWriter,
}

impl LiveWriter {
    /// Sends the session configuration. Must be the first message.
    pub async fn send_setup(&mut self, setup: Setup) -> Result<()> {
        let json = serde_json::to_string(&SetupMessage { setup })?;
        self.write
            .send(Message::Text(json))
            .await
            .context("Failed to send setup message")
    }

    /// Sends one chunk of base64-encoded audio.
    pub async fn send_audio(&mut self, mime_type: &str, base64_data: String) -> Result<()> {
        let msg = RealtimeInputMessage {
            realtime_input: RealtimeInput {
                audio: Blob {
                    mime_type: mime_type.to_string(),
                    data: base64_data,
                },
            },
        };
        let json = serde_json::to_string(&msg)?;
        self.write
            .send(Message::Text(json))
            .await
            .context("Failed to send audio chunk")
    }

    pub async fn close(&mut self) -> Result<()> {
        self.write
            .close()
            .await
            .context("Failed to close Gemini live WebSocket")
    }
}

/// Receiving half of a live socket.
pub struct LiveReader {
    read: WsReader,
}

impl LiveReader {
    /// Reads the next message. `Ok(None)` means the stream ended without a
    /// close frame.
    pub async fn next_message(&mut self) -> Result<Option<Incoming>> {
        while let Some(msg) = self.read.next().await {
            match msg {
                // The service sends JSON in both text and binary frames.
                Ok(Message::Text(text)) => return parse(text.as_bytes()).map(Some),
                Ok(Message::Binary(bytes)) => return parse(&bytes).map(Some),
                Ok(Message::Close(frame)) => {
                    tracing::info!("Gemini live WebSocket closed: {:?}", frame);
                    let (code, reason) = match frame {
                        Some(f) => (Some(u16::from(f.code)), f.reason.into_owned()),
                        None => (None, String::new()),
                    };
                    return Ok(Some(Incoming::Closed { code, reason }));
                }
                Err(e) => {
                    tracing::error!("Error reading from Gemini live WebSocket: {}", e);
                    return Err(e.into());
                }
                _ => { /* Ignore Ping/Pong */ }
            }
        }
        Ok(None)
    }
}

fn parse(bytes: &[u8]) -> Result<Incoming> {
    let message: ServerMessage =
        serde_json::from_slice(bytes).context("Failed to deserialize server message")?;
    Ok(Incoming::Message(message))
}
