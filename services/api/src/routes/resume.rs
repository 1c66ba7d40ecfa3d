use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ParsedResume {
    pub success: bool,
    pub text: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/parse", post(parse_resume))
}

/// Body is the raw PDF.
async fn parse_resume(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<ParsedResume>> {
    let text = state.resume.summarize_pdf(body.to_vec()).await?;
    Ok(Json(ParsedResume { success: true, text }))
}
