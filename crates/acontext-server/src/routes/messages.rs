//! StoreMessage/GetMessages HTTP surface.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use acontext_messages::{
    EditStrategy, GetMessagesRequest as ServiceGetMessagesRequest, MessageService, StoreMessageRequest,
};
use acontext_schema::{Message, Part, SourceFormat};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{session_id}/messages", post(store_message))
        .route("/{session_id}/messages/search", post(get_messages))
}

#[derive(Deserialize)]
pub struct StoreMessageBody {
    pub project_id: String,
    pub source_format: SourceFormat,
    pub raw: serde_json::Value,
}

async fn store_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<StoreMessageBody>,
) -> Result<Json<Message>, ApiError> {
    let service = MessageService::new(&state.store, state.blob.as_ref(), &state.cache, Some(&state.bus));
    let message = service
        .store_message(StoreMessageRequest {
            session_id,
            project_id: body.project_id,
            source_format: body.source_format,
            raw: body.raw,
        })
        .await?;
    Ok(Json(message))
}

#[derive(Deserialize)]
#[serde(default)]
pub struct GetMessagesBody {
    pub limit: i64,
    pub cursor: Option<String>,
    pub time_desc: bool,
    pub with_asset_public_url: bool,
    pub asset_expire_secs: u64,
    pub edit_strategies: Vec<EditStrategy>,
    pub pin_editing_strategies_at_message: Option<String>,
    pub target_format: Option<SourceFormat>,
}

impl Default for GetMessagesBody {
    fn default() -> Self {
        Self {
            limit: 50,
            cursor: None,
            time_desc: false,
            with_asset_public_url: false,
            asset_expire_secs: 3600,
            edit_strategies: Vec::new(),
            pin_editing_strategies_at_message: None,
            target_format: None,
        }
    }
}

#[derive(Serialize)]
pub struct MessageWithPartsBody {
    #[serde(flatten)]
    pub message: Message,
    pub parts: Vec<Part>,
    pub projected: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct GetMessagesResponseBody {
    pub items: Vec<MessageWithPartsBody>,
    pub has_more: bool,
    pub next_cursor: String,
    pub edit_at_message_id: String,
    pub asset_urls: std::collections::HashMap<String, String>,
}

async fn get_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<GetMessagesBody>,
) -> Result<Json<GetMessagesResponseBody>, ApiError> {
    let service = MessageService::new(&state.store, state.blob.as_ref(), &state.cache, Some(&state.bus));
    let response = service
        .get_messages(ServiceGetMessagesRequest {
            session_id,
            limit: body.limit,
            cursor: body.cursor,
            time_desc: body.time_desc,
            with_asset_public_url: body.with_asset_public_url,
            asset_expire_secs: body.asset_expire_secs,
            edit_strategies: body.edit_strategies,
            pin_editing_strategies_at_message: body.pin_editing_strategies_at_message,
            target_format: body.target_format,
        })
        .await?;
    Ok(Json(GetMessagesResponseBody {
        items: response
            .items
            .into_iter()
            .map(|item| MessageWithPartsBody { message: item.message, parts: item.parts, projected: item.projected })
            .collect(),
        has_more: response.has_more,
        next_cursor: response.next_cursor,
        edit_at_message_id: response.edit_at_message_id,
        asset_urls: response.asset_urls,
    }))
}
