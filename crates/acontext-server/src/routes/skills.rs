//! Skill ingest/GetFile HTTP surface.

use axum::extract::{Multipart, Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use acontext_schema::AgentSkill;
use acontext_skills::{get_file, IngestSkillRequest, PlainTextParser, SkillFileContent};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{project_id}/skills", post(ingest_skill))
        .route("/{project_id}/skills/{skill_id}/files/{*path}", get(get_skill_file))
}

async fn ingest_skill(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<AgentSkill>, ApiError> {
    let mut zip_bytes = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|err| anyhow::anyhow!(err))? {
        if field.name() == Some("archive") {
            zip_bytes = field.bytes().await.map_err(|err| anyhow::anyhow!(err))?.to_vec();
        }
    }
    let skill = acontext_skills::ingest_skill(
        &state.store,
        state.blob.clone(),
        IngestSkillRequest { project_id, user_id: None, zip_bytes, meta: serde_json::json!({}) },
    )
    .await?;
    Ok(Json(skill))
}

#[derive(Serialize)]
#[serde(untagged)]
enum SkillFileResponse {
    Inline { content: String },
    Url { url: String },
}

async fn get_skill_file(
    State(state): State<AppState>,
    Path((_project_id, skill_id, path)): Path<(String, String, String)>,
) -> Result<Json<SkillFileResponse>, ApiError> {
    let skill = state
        .store
        .skills()
        .get(&skill_id)
        .await?
        .ok_or(acontext_schema::CoreError::SkillNotFound)?;
    let content = get_file(state.blob.as_ref(), &PlainTextParser, &skill, &path, 3600).await?;
    Ok(Json(match content {
        SkillFileContent::Inline(content) => SkillFileResponse::Inline { content },
        SkillFileContent::PresignedUrl(url) => SkillFileResponse::Url { url },
    }))
}
