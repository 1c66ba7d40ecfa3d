use crate::error::CredentialError;
use reqwest::Client;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    #[default]
    ApiKey,
    /// Short-lived token minted by a backend.
    Ephemeral,
}

/// A secret the live endpoint accepts.
#[derive(Debug, Clone)]
pub struct Credential {
    pub kind: CredentialKind,
    pub secret: SecretString,
}

impl Credential {
    pub fn api_key(secret: SecretString) -> Self {
        Self {
            kind: CredentialKind::ApiKey,
            secret,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(default)]
    kind: CredentialKind,
}

/// Resolves the credential for a live session: the token endpoint first,
/// then a statically configured key.
pub struct CredentialProvider {
    client: Client,
    token_url: Option<String>,
    fallback: Option<SecretString>,
}

impl CredentialProvider {
    pub fn new(token_url: Option<String>, fallback: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            token_url,
            fallback,
        }
    }

    pub async fn resolve(&self) -> Result<Credential, CredentialError> {
        let fetched = match &self.token_url {
            Some(url) => match self.fetch(url).await {
                Ok(credential) => return Ok(credential),
                Err(e) => {
                    tracing::warn!("Token endpoint failed: {}", e);
                    Some(e)
                }
            },
            None => None,
        };

        match (&self.fallback, fetched) {
            (Some(key), _) => {
                tracing::debug!("Using the configured API key for the live session");
                Ok(Credential::api_key(key.clone()))
            }
            (None, Some(err)) => Err(err),
            (None, None) => Err(CredentialError::Missing),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Credential, CredentialError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CredentialError::TokenFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CredentialError::TokenFetch(format!("status {status}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::TokenFetch(e.to_string()))?;
        if body.token.trim().is_empty() {
            return Err(CredentialError::TokenFetch("empty token".into()));
        }
        Ok(Credential {
            kind: body.kind,
            secret: SecretString::from(body.token),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn key(s: &str) -> Option<SecretString> {
        Some(SecretString::from(s.to_string()))
    }

    #[tokio::test]
    async fn token_endpoint_wins_when_it_answers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"token": "tok-1", "kind": "ephemeral"})),
            )
            .mount(&server)
            .await;

        let provider = CredentialProvider::new(Some(format!("{}/api/token", server.uri())), key("static"));
        let credential = provider.resolve().await.unwrap();
        assert_eq!(credential.kind, CredentialKind::Ephemeral);
        assert_eq!(credential.secret.expose_secret(), "tok-1");
    }

    #[tokio::test]
    async fn failed_fetch_falls_back_to_static_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = CredentialProvider::new(Some(server.uri()), key("static"));
        let credential = provider.resolve().await.unwrap();
        assert_eq!(credential.kind, CredentialKind::ApiKey);
        assert_eq!(credential.secret.expose_secret(), "static");
    }

    #[tokio::test]
    async fn failed_fetch_without_fallback_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = CredentialProvider::new(Some(server.uri()), None);
        assert!(matches!(
            provider.resolve().await,
            Err(CredentialError::TokenFetch(_))
        ));
    }

    #[tokio::test]
    async fn nothing_configured_is_missing() {
        let provider = CredentialProvider::new(None, None);
        assert!(matches!(provider.resolve().await, Err(CredentialError::Missing)));
    }
}
