use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use interview_core::graph_view::{GraphView, user_graph};
use interview_core::skills::ExtractedSkill;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const SAMPLE_USER: &str = "test-user-v2";

const SAMPLE_RESUME: &str = "
Alex Chen
Senior Frontend Engineer

Technical Skills:
- Proficient in React, Next.js, and TypeScript.
- Experienced with State Management (Redux, Zustand).
- Backend knowledge: Node.js, Express, and Basic Python.
- Database: MongoDB and Firestore.
- Tools: Docker, Git, CI/CD (GitHub Actions).

Summary: 5 years of experience building high-performance web applications.
";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQuery {
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub user_id: String,
    #[serde(default)]
    pub resume_text: String,
    #[serde(default)]
    pub jd_text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub message: &'static str,
    pub user_id: String,
    pub extracted_skills: Vec<ExtractedSkill>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/graph", get(get_graph))
        .route("/graph/sync", post(sync_graph))
        .route("/test-graph", get(sample_sync))
}

async fn get_graph(
    State(state): State<AppState>,
    Query(query): Query<GraphQuery>,
) -> ApiResult<Json<GraphView>> {
    let user_id = query
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("userId is required"))?;
    Ok(Json(user_graph(state.graph.as_ref(), &user_id).await?))
}

async fn sync_graph(
    State(state): State<AppState>,
    Json(req): Json<SyncRequest>,
) -> ApiResult<Json<SyncResponse>> {
    if req.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("userId is required"));
    }
    let skills = state
        .extractor
        .sync(&req.user_id, &req.resume_text, &req.jd_text)
        .await?;
    Ok(Json(SyncResponse {
        success: true,
        message: "Graph sync completed",
        user_id: req.user_id,
        extracted_skills: skills,
    }))
}

/// Debug helper: syncs a fixed resume for a fixed user.
async fn sample_sync(State(state): State<AppState>) -> ApiResult<Json<SyncResponse>> {
    let skills = state.extractor.sync(SAMPLE_USER, SAMPLE_RESUME, "").await?;
    Ok(Json(SyncResponse {
        success: true,
        message: "Graph sync completed",
        user_id: SAMPLE_USER.to_string(),
        extracted_skills: skills,
    }))
}
