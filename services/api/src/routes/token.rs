use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use interview_core::credentials::CredentialKind;
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub kind: CredentialKind,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/token", get(issue_token))
}

/// Hands the configured key to the browser. The live endpoint accepts it
/// directly; an ephemeral-token minting step would slot in here.
async fn issue_token(State(state): State<AppState>) -> ApiResult<Json<TokenResponse>> {
    let key = state
        .live_key
        .as_ref()
        .ok_or_else(|| ApiError::internal("API key not configured"))?;
    Ok(Json(TokenResponse {
        token: key.expose_secret().to_string(),
        kind: CredentialKind::ApiKey,
    }))
}

#[cfg(test)]
mod tests {
    use crate::create_router;
    use crate::test_support::{body_json, state_with_reply};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn token_returns_configured_key() {
        let app = create_router(state_with_reply(""));
        let response = app
            .oneshot(Request::builder().uri("/api/token").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["token"], "test-key");
        assert_eq!(json["kind"], "api_key");
    }

    #[tokio::test]
    async fn missing_key_is_a_server_error() {
        let mut state = state_with_reply("");
        state.live_key = None;
        let response = create_router(state)
            .oneshot(Request::builder().uri("/api/token").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "API key not configured");
    }
}
