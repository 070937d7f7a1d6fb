//! Message write/read paths, wiring together the normalizer, the Gemini ID
//! resolver, the parts store, the edit pipeline, and the relational store
//! as an ordered-step request handler.

use std::collections::HashMap;

use acontext_blob::BlobStore;
use acontext_bus::{Publisher, EXCHANGE_SESSION_MESSAGE, ROUTING_KEY_SESSION_MESSAGE_INSERT};
use acontext_schema::{CoreError, CoreResult, Message, Part, SourceFormat};
use acontext_store::{NewMessage, Store};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::edit_pipeline::{self, EditStrategy, EditableMessage};
use crate::normalize;
use crate::parts_store::{PartsCache, PartsStore};

pub struct MessageService<'a> {
    store: &'a Store,
    blob: &'a dyn BlobStore,
    cache: &'a PartsCache,
    publisher: Option<&'a dyn Publisher>,
}

pub struct StoreMessageRequest {
    pub session_id: String,
    pub project_id: String,
    pub source_format: SourceFormat,
    pub raw: Value,
}

pub struct GetMessagesRequest {
    pub session_id: String,
    pub limit: i64,
    pub cursor: Option<String>,
    pub time_desc: bool,
    pub with_asset_public_url: bool,
    pub asset_expire_secs: u64,
    pub edit_strategies: Vec<EditStrategy>,
    pub pin_editing_strategies_at_message: Option<String>,
    /// When set, each returned item also carries its parts denormalized
    /// back into this provider's wire shape (§4.1's inverse projection).
    pub target_format: Option<SourceFormat>,
}

/// A message as it comes back from `GetMessages`: the stored row shape
/// plus the parts that survived resolution and the Edit Pipeline, since
/// `Message` itself only carries the opaque blob reference.
pub struct MessageWithParts {
    pub message: Message,
    pub parts: Vec<Part>,
    pub projected: Option<Value>,
}

pub struct GetMessagesResponse {
    pub items: Vec<MessageWithParts>,
    pub has_more: bool,
    pub next_cursor: String,
    pub edit_at_message_id: String,
    pub asset_urls: HashMap<String, String>,
}

impl<'a> MessageService<'a> {
    pub fn new(
        store: &'a Store,
        blob: &'a dyn BlobStore,
        cache: &'a PartsCache,
        publisher: Option<&'a dyn Publisher>,
    ) -> Self {
        Self { store, blob, cache, publisher }
    }

    /// Each numbered step must complete before the next.
    pub async fn store_message(&self, req: StoreMessageRequest) -> Result<Message> {
        // Step 1: session validation.
        let session = self
            .store
            .sessions()
            .get(&req.session_id)
            .await?
            .ok_or(CoreError::SessionNotFound)?;
        if session.project_id != req.project_id {
            return Err(CoreError::SessionProjectMismatch.into());
        }

        let normalized = normalize::normalize(req.source_format, &req.raw)?;
        let mut parts = normalized.parts;
        let meta = normalized.meta;

        // Step 2: Gemini resolution, before any upload.
        if req.source_format == SourceFormat::Gemini {
            let queue = self.store.gemini_call_queue();
            crate::gemini_resolver::resolve(&queue, &req.session_id, &mut parts).await?;
        }

        // Step 3: part-level asset uploads.
        let assets_repo = self.store.assets();
        for part in parts.iter_mut() {
            self.upload_part_asset(&req.project_id, part, &assets_repo).await?;
        }

        // Step 4: parts blob upload.
        let parts_store = PartsStore::new(self.blob, self.cache);
        let parts_asset = parts_store.write(&req.project_id, &parts).await?;

        // Step 5: row insert.
        let new_message = NewMessage {
            session_id: req.session_id.clone(),
            project_id: req.project_id.clone(),
            role: normalized.role,
            meta,
            parts_asset,
        };
        let row = self.store.messages().insert(new_message).await?;

        // Gemini call-info entries this message produced are pushed onto
        // the session's queue immediately after the row insert, not inside
        // the same SQL transaction as the insert (see DESIGN.md).
        if req.source_format == SourceFormat::Gemini {
            let call_info = row.meta.as_object().and_then(|m| m.get(acontext_schema::GEMINI_CALL_INFO_KEY)).cloned();
            if let Some(call_info) = call_info {
                if let Ok(entries) = serde_json::from_value::<Vec<acontext_schema::GeminiCallInfo>>(call_info) {
                    if !entries.is_empty() {
                        self.store.gemini_call_queue().push(&req.session_id, &entries).await?;
                    }
                }
            }
        }

        let message = Message {
            id: row.id,
            session_id: row.session_id,
            project_id: row.project_id,
            role: row.role,
            created_at: row.created_at,
            meta: row.meta,
            parts_asset: row.parts_asset,
        };

        // Step 6: task-terminal publish, best-effort.
        if !session.disable_task_tracking {
            if let Some(publisher) = self.publisher {
                let payload = json!({
                    "project_id": message.project_id,
                    "session_id": message.session_id,
                    "message_id": message.id,
                });
                if let Err(err) = publisher
                    .publish_json(EXCHANGE_SESSION_MESSAGE, ROUTING_KEY_SESSION_MESSAGE_INSERT, payload)
                    .await
                {
                    tracing::warn!(error = %err, message_id = message.id, "session.message.insert publish failed");
                }
            }
        }

        Ok(message)
    }

    async fn upload_part_asset(
        &self,
        project_id: &str,
        part: &mut Part,
        assets_repo: &acontext_store::AssetReferenceRepo,
    ) -> Result<()> {
        let Some(data_b64) = part.meta_str("inline_base64").map(str::to_string) else {
            return Ok(());
        };
        let mime = part.meta_str("inline_mime").unwrap_or("application/octet-stream").to_string();
        let bytes = STANDARD.decode(data_b64.as_bytes()).context("decode inline base64 payload")?;
        let key = format!("assets/{project_id}/{}", Uuid::new_v4());
        let asset = self.blob.upload_bytes(&key, bytes, &mime).await?;
        assets_repo.increment(project_id, &asset.sha256).await?;
        part.asset = Some(asset);
        Ok(())
    }

    pub async fn get_messages(&self, req: GetMessagesRequest) -> Result<GetMessagesResponse> {
        let after = match &req.cursor {
            Some(raw) => Some(decode_cursor(raw)?),
            None => None,
        };

        let rows = if req.limit <= 0 {
            self.store.messages().list_all_by_session(&req.session_id).await?
        } else {
            self.store
                .messages()
                .list_by_session_with_cursor(&req.session_id, after, req.limit + 1, req.time_desc)
                .await?
        };

        let mut rows = rows;
        // Always ascending chronological order regardless of query direction.
        rows.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        let mut has_more = false;
        let mut next_cursor = String::new();
        if req.limit > 0 && (rows.len() as i64) > req.limit {
            has_more = true;
            rows.truncate(req.limit as usize);
            if let Some(last) = rows.last() {
                next_cursor = crate::cursor::encode(last.created_at, parse_uuid(&last.id));
            }
        }

        let parts_store = PartsStore::new(self.blob, self.cache);
        let mut editable = Vec::with_capacity(rows.len());
        let mut by_id: HashMap<String, acontext_store::MessageRow> = HashMap::new();
        for row in rows {
            match parts_store.read(&row.parts_asset).await {
                Some(parts) => {
                    editable.push(EditableMessage { id: row.id.clone(), created_at: row.created_at, parts });
                    by_id.insert(row.id.clone(), row);
                }
                None => {
                    tracing::warn!(message_id = row.id, "parts unresolvable, skipping message from result set");
                }
            }
        }

        let (edited, edit_at_message_id) = edit_pipeline::apply(
            editable,
            &req.edit_strategies,
            req.pin_editing_strategies_at_message.as_deref(),
        );

        let mut asset_urls = HashMap::new();
        let mut items = Vec::with_capacity(edited.len());
        for edited_message in edited {
            let Some(row) = by_id.remove(&edited_message.id) else {
                continue;
            };

            if req.with_asset_public_url {
                for part in &edited_message.parts {
                    if let Some(asset) = &part.asset {
                        if !asset_urls.contains_key(&asset.sha256) {
                            if let Ok(url) = self.blob.presign_get(&asset.key, req.asset_expire_secs).await {
                                asset_urls.insert(asset.sha256.clone(), url);
                            }
                        }
                    }
                }
            }

            let message = Message {
                id: edited_message.id,
                session_id: req.session_id.clone(),
                project_id: row.project_id,
                role: row.role,
                created_at: edited_message.created_at,
                meta: row.meta,
                parts_asset: row.parts_asset,
            };

            let projected = req
                .target_format
                .map(|fmt| normalize::denormalize(fmt, message.role, &edited_message.parts, &message.meta));

            items.push(MessageWithParts { message, parts: edited_message.parts, projected });
        }

        Ok(GetMessagesResponse { items, has_more, next_cursor, edit_at_message_id, asset_urls })
    }
}

fn decode_cursor(raw: &str) -> CoreResult<(DateTime<Utc>, Uuid)> {
    let cursor = crate::cursor::decode(raw)?;
    Ok((cursor.created_at, cursor.id))
}

fn parse_uuid(raw: &str) -> Uuid {
    Uuid::parse_str(raw).unwrap_or_else(|_| Uuid::nil())
}
