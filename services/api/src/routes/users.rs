use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use interview_core::Session;
use interview_core::context::{GraphContext, graph_context};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{user_id}/sessions", get(list_sessions))
        .route("/{user_id}/context", get(user_context))
}

/// Newest first.
async fn list_sessions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Session>>> {
    Ok(Json(state.sessions.list_for_user(&user_id).await?))
}

async fn user_context(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<GraphContext>> {
    graph_context(state.graph.as_ref(), &user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no skills recorded for {user_id}")))
}

#[cfg(test)]
mod tests {
    use crate::create_router;
    use crate::test_support::{body_json, state_with_reply};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use interview_core::skills::{ExtractedSkill, Proficiency};
    use interview_core::{Difficulty, SessionConfig};
    use tower::ServiceExt;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn history_lists_only_that_user() {
        let state = state_with_reply("");
        state
            .sessions
            .create("u1", SessionConfig::new("SRE", Difficulty::Easy))
            .await
            .unwrap();
        state
            .sessions
            .create("u2", SessionConfig::new("PM", Difficulty::Medium))
            .await
            .unwrap();

        let response = create_router(state).oneshot(get("/api/users/u1/sessions")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let list = body_json(response).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["config"]["role"], "SRE");
    }

    #[tokio::test]
    async fn context_is_not_found_without_skills() {
        let response = create_router(state_with_reply(""))
            .oneshot(get("/api/users/ghost/context"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn context_groups_skills() {
        let state = state_with_reply("");
        let skill = ExtractedSkill {
            name: "Rust".into(),
            category: "Language".into(),
            level: Proficiency::Beginner,
            description: String::new(),
            related: Vec::new(),
        };
        state.graph.upsert_skills("u1", &[skill]).await.unwrap();

        let response = create_router(state).oneshot(get("/api/users/u1/context")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["weakSkills"][0], "Rust");
    }
}
