//! Maps `CoreError`/`anyhow::Error` onto HTTP responses, centralized here
//! rather than matched ad hoc per handler since every route goes through
//! the same `CoreError` surface.

use acontext_schema::CoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match self.0.downcast_ref::<CoreError>() {
            Some(CoreError::SessionNotFound | CoreError::LearningSpaceNotFound | CoreError::SkillNotFound) => {
                (StatusCode::NOT_FOUND, self.0.to_string())
            }
            Some(CoreError::SkillAlreadyExists | CoreError::SessionAlreadyLearned) => {
                (StatusCode::CONFLICT, self.0.to_string())
            }
            Some(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            None => {
                tracing::error!(error = %self.0, "unhandled infrastructure error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error".to_string())
            }
        };
        (status, Json(json!({"error": code}))).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
