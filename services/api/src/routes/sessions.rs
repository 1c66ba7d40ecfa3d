use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use interview_core::debrief::Debrief;
use interview_core::{Session, SessionConfig, Speaker, StoreError, TranscriptTurn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSession {
    pub user_id: String,
    pub config: SessionConfig,
}

#[derive(Serialize)]
pub struct Created {
    pub success: bool,
    pub id: String,
}

#[derive(Deserialize)]
pub struct AppendTurn {
    pub role: Speaker,
    pub text: String,
    pub timestamp: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/{id}", get(get_session))
        .route("/{id}/transcript", post(append_transcript))
        .route("/{id}/end", post(end_session))
        .route("/{id}/debrief", post(generate_debrief))
}

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSession>,
) -> ApiResult<Json<Created>> {
    if req.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("userId is required"));
    }
    if req.config.role.trim().is_empty() {
        return Err(ApiError::bad_request("config.role is required"));
    }
    let id = state.sessions.create(&req.user_id, req.config).await?;
    tracing::info!("Created session {} for {}", id, req.user_id);
    Ok(Json(Created { success: true, id }))
}

async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Session>> {
    let session = state
        .sessions
        .get(&id)
        .await?
        .ok_or(StoreError::NotFound(id))?;
    Ok(Json(session))
}

async fn append_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AppendTurn>,
) -> ApiResult<Json<Value>> {
    let mut turn = TranscriptTurn::now(req.role, &req.text);
    if let Some(ts) = req.timestamp {
        turn.timestamp = ts;
    }
    state.sessions.append_turn(&id, turn).await?;
    Ok(Json(json!({ "success": true })))
}

async fn end_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    state.sessions.mark_ended(&id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn generate_debrief(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Debrief>> {
    Ok(Json(state.debriefs.generate(&id).await?))
}

#[cfg(test)]
mod tests {
    use crate::create_router;
    use crate::test_support::{body_json, state_with_reply};
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn create(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/sessions",
                r#"{"userId":"u1","config":{"role":"Backend Engineer","difficulty":"hard"}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn session_lifecycle_over_http() {
        let app = create_router(state_with_reply(
            r#"{"conversation_summary":"Short chat.","scores":{"overall":140}}"#,
        ));
        let id = create(&app).await;

        for (role, text) in [("model", "Tell me about yourself."), ("user", "I build APIs.")] {
            let body = format!(r#"{{"role":"{role}","text":"{text}","timestamp":1700000000000}}"#);
            let response = app
                .clone()
                .oneshot(post_json(&format!("/api/sessions/{id}/transcript"), &body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .clone()
            .oneshot(post_json(&format!("/api/sessions/{id}/end"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(post_json(&format!("/api/sessions/{id}/debrief"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["scores"]["overall"], 100);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/sessions/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let session = body_json(response).await;
        assert_eq!(session["status"], "analyzed");
        assert_eq!(session["transcript"].as_array().unwrap().len(), 2);
        assert_eq!(session["transcript"][0]["timestamp"], 1_700_000_000_000i64);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let app = create_router(state_with_reply("{}"));
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/sessions/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(post_json("/api/sessions/nope/debrief", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unparseable_debrief_is_a_server_error() {
        let app = create_router(state_with_reply("I am not JSON"));
        let id = create(&app).await;
        let response = app
            .oneshot(post_json(&format!("/api/sessions/{id}/debrief"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error = body_json(response).await["error"].as_str().unwrap().to_string();
        assert!(error.contains("I am not JSON"));
    }
}
