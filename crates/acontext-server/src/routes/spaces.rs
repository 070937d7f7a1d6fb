//! Learning-space HTTP surface.

use axum::extract::{Path, State};
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::Deserialize;

use acontext_schema::LearningSpace;
use acontext_spaces::SpaceService;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_space))
        .route("/{space_id}/sessions/{session_id}", post(learn_session))
        .route("/{space_id}/skills/{skill_id}", post(include_skill))
        .route("/{space_id}/skills/{skill_id}", delete(exclude_skill))
}

#[derive(Deserialize)]
pub struct CreateSpaceBody {
    pub project_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub meta: serde_json::Value,
}

async fn create_space(
    State(state): State<AppState>,
    Json(body): Json<CreateSpaceBody>,
) -> Result<Json<LearningSpace>, ApiError> {
    let service = SpaceService::new(&state.store, state.blob.clone(), Some(&state.bus));
    let space = service.create(&body.project_id, body.user_id, body.meta).await?;
    Ok(Json(space))
}

async fn learn_session(
    State(state): State<AppState>,
    Path((space_id, session_id)): Path<(String, String)>,
) -> Result<(), ApiError> {
    let service = SpaceService::new(&state.store, state.blob.clone(), Some(&state.bus));
    service.learn(&space_id, &session_id).await?;
    Ok(())
}

async fn include_skill(
    State(state): State<AppState>,
    Path((space_id, skill_id)): Path<(String, String)>,
) -> Result<(), ApiError> {
    let service = SpaceService::new(&state.store, state.blob.clone(), Some(&state.bus));
    service.include_skill(&space_id, &skill_id).await?;
    Ok(())
}

async fn exclude_skill(
    State(state): State<AppState>,
    Path((space_id, skill_id)): Path<(String, String)>,
) -> Result<(), ApiError> {
    let service = SpaceService::new(&state.store, state.blob.clone(), Some(&state.bus));
    service.exclude_skill(&space_id, &skill_id).await?;
    Ok(())
}
