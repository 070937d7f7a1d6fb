pub mod messages;
pub mod skills;
pub mod spaces;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/sessions", messages::router())
        .nest("/projects", skills::router())
        .nest("/spaces", spaces::router())
}
