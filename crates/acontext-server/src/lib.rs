//! Thin axum shell wiring the message/skill/space services into HTTP
//! routes via `create_router`/`serve`.

pub mod error;
pub mod routes;
pub mod state;

use anyhow::Result;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .nest("/api", routes::api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr, "acontext-server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use acontext_blob::FsBlobStore;
    use acontext_bus::EventBus;
    use acontext_store::Store;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    #[tokio::test]
    async fn create_space_round_trips_through_the_router() {
        let dir = TempDir::new().unwrap();
        let store = Store::open_in_memory().unwrap();
        let blob: Arc<dyn acontext_blob::BlobStore> = Arc::new(FsBlobStore::new(dir.path()));
        let bus = EventBus::new(8);
        let state = AppState::new(store, blob, bus.sender());
        let app = create_router(state);

        let body = serde_json::json!({"project_id": "p1"});
        let request = Request::builder()
            .method("POST")
            .uri("/api/spaces/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn store_message_for_unknown_session_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = Store::open_in_memory().unwrap();
        let blob: Arc<dyn acontext_blob::BlobStore> = Arc::new(FsBlobStore::new(dir.path()));
        let bus = EventBus::new(8);
        let state = AppState::new(store, blob, bus.sender());
        let app = create_router(state);

        let body = serde_json::json!({
            "project_id": "p1",
            "source_format": "acontext",
            "raw": {"role": "user", "parts": []},
        });
        let request = Request::builder()
            .method("POST")
            .uri("/api/sessions/missing-session/messages")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
