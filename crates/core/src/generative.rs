use crate::error::{GenerationError, excerpt};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

pub const GENERATIVE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Longest slice of a bad model response quoted back in errors.
const EXCERPT_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct InlineData {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// One single-turn generation call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerateRequest {
    pub system: Option<String>,
    pub text: String,
    pub attachment: Option<InlineData>,
    /// Ask for JSON output, optionally constrained to this schema.
    pub json_output: bool,
    pub response_schema: Option<Value>,
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: &str) -> Self {
        self.system = Some(system.to_string());
        self
    }

    pub fn with_attachment(mut self, mime_type: &str, data: Vec<u8>) -> Self {
        self.attachment = Some(InlineData {
            mime_type: mime_type.to_string(),
            data,
        });
        self
    }

    pub fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.json_output = true;
        self.response_schema = Some(schema);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn to_body(&self) -> Value {
        let mut parts = vec![json!({ "text": self.text })];
        if let Some(inline) = &self.attachment {
            parts.push(json!({
                "inlineData": {
                    "mimeType": inline.mime_type,
                    "data": general_purpose::STANDARD.encode(&inline.data),
                }
            }));
        }

        let mut generation_config = serde_json::Map::new();
        if self.json_output {
            generation_config.insert("responseMimeType".into(), json!("application/json"));
        }
        if let Some(schema) = &self.response_schema {
            generation_config.insert("responseSchema".into(), schema.clone());
        }
        if let Some(t) = self.temperature {
            generation_config.insert("temperature".into(), json!(t));
        }

        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }],
        });
        if !generation_config.is_empty() {
            body["generationConfig"] = Value::Object(generation_config);
        }
        if let Some(system) = &self.system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }
}

/// A hosted model that turns a prompt into text.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GenerationError>;
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// `generateContent` over REST.
pub struct GeminiTextClient {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GeminiTextClient {
    pub fn new(api_key: SecretString, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: GENERATIVE_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl GenerativeModel for GeminiTextClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        tracing::debug!("generateContent on {}", self.model);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request.to_body())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: excerpt(&body, 500),
            });
        }

        let resp: GenerateResponse = resp.json().await?;
        let text: String = resp
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(text)
    }
}

/// Removes markdown code fences a model may wrap JSON in.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parses a model's JSON answer, quoting the start of it on failure.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, GenerationError> {
    serde_json::from_str(strip_code_fences(raw)).map_err(|e| {
        tracing::error!("Failed to parse model JSON: {}", e);
        GenerationError::Malformed {
            excerpt: excerpt(raw, EXCERPT_LEN),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GeminiTextClient {
        GeminiTextClient::new(SecretString::from("test-key".to_string()), "gemini-test".into())
            .with_base_url(&server.uri())
    }

    #[tokio::test]
    async fn sends_schema_and_joins_text_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server)
            .generate(GenerateRequest::text("hi").with_schema(json!({"type": "OBJECT"})))
            .await
            .unwrap();
        assert_eq!(text, "{\"a\":1}");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = client(&server)
            .generate(GenerateRequest::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Status { status: 429, ref body } if body == "slow down"));
    }

    #[test]
    fn attachment_is_base64_inline_data() {
        let body = GenerateRequest::text("parse")
            .with_attachment("application/pdf", b"%PDF".to_vec())
            .to_body();
        let part = &body["contents"][0]["parts"][1]["inlineData"];
        assert_eq!(part["mimeType"], "application/pdf");
        assert_eq!(part["data"], "JVBERg==");
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn fenced_json_parses() {
        let v: Vec<u32> = parse_json("```json\n[1, 2]\n```").unwrap();
        assert_eq!(v, vec![1, 2]);
    }

    #[test]
    fn malformed_json_keeps_a_short_excerpt() {
        let raw = "x".repeat(300);
        let err = parse_json::<Value>(&raw).unwrap_err();
        match err {
            GenerationError::Malformed { excerpt } => assert_eq!(excerpt.len(), 100),
            other => panic!("unexpected {other:?}"),
        }
    }
}
