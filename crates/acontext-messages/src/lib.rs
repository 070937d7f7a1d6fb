//! Message pipeline: per-format normalizers, Gemini tool-call ID resolution,
//! blob-backed parts storage, the edit pipeline, and opaque pagination
//! cursors, wired together by [`MessageService`].

pub mod cursor;
pub mod edit_pipeline;
pub mod gemini_resolver;
pub mod normalize;
pub mod parts_store;
pub mod service;

pub use edit_pipeline::{apply as apply_edit_pipeline, EditStrategy, EditableMessage};
pub use normalize::{denormalize, normalize, Normalized};
pub use parts_store::{PartsCache, PartsStore};
pub use service::{GetMessagesRequest, GetMessagesResponse, MessageService, MessageWithParts, StoreMessageRequest};

#[cfg(test)]
mod tests {
    use super::*;
    use acontext_blob::FsBlobStore;
    use acontext_schema::{Session, SourceFormat};
    use acontext_store::Store;
    use serde_json::json;
    use tempfile::TempDir;

    async fn new_fixture() -> (Store, FsBlobStore, PartsCache, TempDir, Session) {
        let dir = TempDir::new().unwrap();
        let store = Store::open_in_memory().unwrap();
        let blob = FsBlobStore::new(dir.path());
        let cache = PartsCache::new();
        let session = Session::new("proj1", None);
        store.sessions().insert(&session).await.unwrap();
        (store, blob, cache, dir, session)
    }

    #[tokio::test]
    async fn store_then_get_round_trips_a_plain_text_message() {
        let (store, blob, cache, _dir, session) = new_fixture().await;
        let service = MessageService::new(&store, &blob, &cache, None);

        let stored = service
            .store_message(StoreMessageRequest {
                session_id: session.id.clone(),
                project_id: session.project_id.clone(),
                source_format: SourceFormat::Acontext,
                raw: json!({"role": "user", "parts": [{"type": "text", "text": "hello"}], "meta": {}}),
            })
            .await
            .unwrap();

        let response = service
            .get_messages(GetMessagesRequest {
                session_id: session.id.clone(),
                limit: 0,
                cursor: None,
                time_desc: false,
                with_asset_public_url: false,
                asset_expire_secs: 3600,
                edit_strategies: vec![],
                pin_editing_strategies_at_message: None,
                target_format: None,
            })
            .await
            .unwrap();

        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].message.id, stored.id);
        assert_eq!(response.items[0].parts[0].text.as_deref(), Some("hello"));
        assert_eq!(response.edit_at_message_id, stored.id);
        assert!(!response.has_more);
    }

    #[tokio::test]
    async fn store_message_rejects_unknown_session() {
        let (store, blob, cache, _dir, _session) = new_fixture().await;
        let service = MessageService::new(&store, &blob, &cache, None);

        let err = service
            .store_message(StoreMessageRequest {
                session_id: "missing".to_string(),
                project_id: "proj1".to_string(),
                source_format: SourceFormat::Acontext,
                raw: json!({"role": "user", "parts": [], "meta": {}}),
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<acontext_schema::CoreError>(),
            Some(&acontext_schema::CoreError::SessionNotFound)
        );
    }

    #[tokio::test]
    async fn store_message_rejects_project_mismatch() {
        let (store, blob, cache, _dir, session) = new_fixture().await;
        let service = MessageService::new(&store, &blob, &cache, None);

        let err = service
            .store_message(StoreMessageRequest {
                session_id: session.id.clone(),
                project_id: "other-project".to_string(),
                source_format: SourceFormat::Acontext,
                raw: json!({"role": "user", "parts": [], "meta": {}}),
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<acontext_schema::CoreError>(),
            Some(&acontext_schema::CoreError::SessionProjectMismatch)
        );
    }

    #[tokio::test]
    async fn gemini_round_trip_resolves_synthesized_tool_call_id() {
        let (store, blob, cache, _dir, session) = new_fixture().await;
        let service = MessageService::new(&store, &blob, &cache, None);

        service
            .store_message(StoreMessageRequest {
                session_id: session.id.clone(),
                project_id: session.project_id.clone(),
                source_format: SourceFormat::Gemini,
                raw: json!({
                    "role": "model",
                    "parts": [{"function_call": {"name": "get_weather", "args": {"city": "Paris"}}}]
                }),
            })
            .await
            .unwrap();

        let stored_result = service
            .store_message(StoreMessageRequest {
                session_id: session.id.clone(),
                project_id: session.project_id.clone(),
                source_format: SourceFormat::Gemini,
                raw: json!({
                    "role": "user",
                    "parts": [{"function_response": {"name": "get_weather", "response": {"temp_c": 18}}}]
                }),
            })
            .await
            .unwrap();
        assert_eq!(stored_result.role, acontext_schema::Role::User);
    }

    #[tokio::test]
    async fn gemini_name_mismatch_fails_before_any_blob_upload() {
        let (store, blob, cache, _dir, session) = new_fixture().await;
        let service = MessageService::new(&store, &blob, &cache, None);

        service
            .store_message(StoreMessageRequest {
                session_id: session.id.clone(),
                project_id: session.project_id.clone(),
                source_format: SourceFormat::Gemini,
                raw: json!({
                    "role": "model",
                    "parts": [{"function_call": {"name": "get_weather", "args": {}}}]
                }),
            })
            .await
            .unwrap();

        let err = service
            .store_message(StoreMessageRequest {
                session_id: session.id.clone(),
                project_id: session.project_id.clone(),
                source_format: SourceFormat::Gemini,
                raw: json!({
                    "role": "user",
                    "parts": [{"function_response": {"name": "wrong_tool", "response": {}}}]
                }),
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<acontext_schema::CoreError>(),
            Some(&acontext_schema::CoreError::FunctionNameMismatch)
        );
    }

    #[tokio::test]
    async fn empty_session_yields_empty_response() {
        let (store, blob, cache, _dir, session) = new_fixture().await;
        let service = MessageService::new(&store, &blob, &cache, None);

        let response = service
            .get_messages(GetMessagesRequest {
                session_id: session.id.clone(),
                limit: 10,
                cursor: None,
                time_desc: false,
                with_asset_public_url: false,
                asset_expire_secs: 3600,
                edit_strategies: vec![],
                pin_editing_strategies_at_message: None,
                target_format: None,
            })
            .await
            .unwrap();

        assert!(response.items.is_empty());
        assert!(!response.has_more);
        assert_eq!(response.next_cursor, "");
        assert_eq!(response.edit_at_message_id, "");
    }

    #[tokio::test]
    async fn retrieval_always_sorts_ascending_even_with_time_desc() {
        let (store, blob, cache, _dir, session) = new_fixture().await;
        let service = MessageService::new(&store, &blob, &cache, None);

        for text in ["first", "second", "third"] {
            service
                .store_message(StoreMessageRequest {
                    session_id: session.id.clone(),
                    project_id: session.project_id.clone(),
                    source_format: SourceFormat::Acontext,
                    raw: json!({"role": "user", "parts": [{"type": "text", "text": text}], "meta": {}}),
                })
                .await
                .unwrap();
        }

        let response = service
            .get_messages(GetMessagesRequest {
                session_id: session.id.clone(),
                limit: 10,
                cursor: None,
                time_desc: true,
                with_asset_public_url: false,
                asset_expire_secs: 3600,
                edit_strategies: vec![],
                pin_editing_strategies_at_message: None,
                target_format: None,
            })
            .await
            .unwrap();

        assert_eq!(response.items.len(), 3);
        assert!(response
            .items
            .windows(2)
            .all(|w| w[0].message.created_at <= w[1].message.created_at));
        assert!(!response.has_more);
    }

    #[tokio::test]
    async fn edit_pipeline_trim_reaches_the_caller() {
        let (store, blob, cache, _dir, session) = new_fixture().await;
        let service = MessageService::new(&store, &blob, &cache, None);

        service
            .store_message(StoreMessageRequest {
                session_id: session.id.clone(),
                project_id: session.project_id.clone(),
                source_format: SourceFormat::Acontext,
                raw: json!({
                    "role": "user",
                    "parts": [{"type": "tool-result", "meta": {"tool_call_id": "c1"}}],
                    "meta": {}
                }),
            })
            .await
            .unwrap();

        let response = service
            .get_messages(GetMessagesRequest {
                session_id: session.id.clone(),
                limit: 0,
                cursor: None,
                time_desc: false,
                with_asset_public_url: false,
                asset_expire_secs: 3600,
                edit_strategies: vec![EditStrategy::RemoveToolResult { keep_recent_n_tool_results: 0 }],
                pin_editing_strategies_at_message: None,
                target_format: None,
            })
            .await
            .unwrap();

        assert_eq!(response.items.len(), 1);
        assert!(response.items[0].parts.is_empty(), "trimmed tool-result must not reach the caller");
    }

    #[tokio::test]
    async fn target_format_projects_parts_into_requested_wire_shape() {
        let (store, blob, cache, _dir, session) = new_fixture().await;
        let service = MessageService::new(&store, &blob, &cache, None);

        service
            .store_message(StoreMessageRequest {
                session_id: session.id.clone(),
                project_id: session.project_id.clone(),
                source_format: SourceFormat::Acontext,
                raw: json!({"role": "user", "parts": [{"type": "text", "text": "hi"}], "meta": {}}),
            })
            .await
            .unwrap();

        let response = service
            .get_messages(GetMessagesRequest {
                session_id: session.id.clone(),
                limit: 0,
                cursor: None,
                time_desc: false,
                with_asset_public_url: false,
                asset_expire_secs: 3600,
                edit_strategies: vec![],
                pin_editing_strategies_at_message: None,
                target_format: Some(SourceFormat::Openai),
            })
            .await
            .unwrap();

        let projected = response.items[0].projected.as_ref().unwrap();
        assert_eq!(projected["role"], "user");
    }

    #[tokio::test]
    async fn get_messages_skips_a_message_whose_parts_blob_is_corrupt() {
        let (store, blob, cache, dir, session) = new_fixture().await;
        let service = MessageService::new(&store, &blob, &cache, None);

        let stored = service
            .store_message(StoreMessageRequest {
                session_id: session.id.clone(),
                project_id: session.project_id.clone(),
                source_format: SourceFormat::Acontext,
                raw: json!({"role": "user", "parts": [{"type": "text", "text": "hello"}], "meta": {}}),
            })
            .await
            .unwrap();

        let blob_path = dir.path().join(&stored.parts_asset.key);
        tokio::fs::write(&blob_path, b"not json").await.unwrap();

        // Fresh cache so the corrupted bytes on disk are actually hit.
        let fresh_cache = PartsCache::new();
        let reading_service = MessageService::new(&store, &blob, &fresh_cache, None);
        let response = reading_service
            .get_messages(GetMessagesRequest {
                session_id: session.id.clone(),
                limit: 0,
                cursor: None,
                time_desc: false,
                with_asset_public_url: false,
                asset_expire_secs: 3600,
                edit_strategies: vec![],
                pin_editing_strategies_at_message: None,
                target_format: None,
            })
            .await
            .unwrap();

        assert!(response.items.is_empty());
    }
}
