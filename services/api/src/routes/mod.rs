pub mod graph;
pub mod resume;
pub mod sessions;
pub mod token;
pub mod users;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(token::router())
        .merge(graph::router())
        .nest("/resume", resume::router())
        .nest("/sessions", sessions::router())
        .nest("/users", users::router())
}
