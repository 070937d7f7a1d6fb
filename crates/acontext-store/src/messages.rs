use acontext_schema::{Asset, Role};
use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use tokio::task;
use uuid::Uuid;

use crate::{lock_err, Store};

/// A message row as stored (parts live in the blob store, referenced by
/// `parts_asset`). Mirrors `acontext_schema::Message` but is the unit the
/// store layer reads/writes directly.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub session_id: String,
    pub project_id: String,
    pub role: Role,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub meta: serde_json::Value,
    pub parts_asset: Asset,
}

/// Input to an insert; `id`/`created_at` are assigned here so callers never
/// race on monotonic ordering of their own accord.
pub struct NewMessage {
    pub session_id: String,
    pub project_id: String,
    pub role: Role,
    pub meta: serde_json::Value,
    pub parts_asset: Asset,
}

pub struct MessageRepo {
    store: Store,
}

impl MessageRepo {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// Inserts the message row. Callers are responsible for having already
    /// run Gemini resolution and asset uploads (§4.4 steps 1-4); this is
    /// step 5, the atomic row insert.
    pub async fn insert(&self, new_message: NewMessage) -> Result<MessageRow> {
        let db = self.store.db();
        let row = MessageRow {
            id: Uuid::new_v4().to_string(),
            session_id: new_message.session_id,
            project_id: new_message.project_id,
            role: new_message.role,
            created_at: chrono::Utc::now(),
            meta: new_message.meta,
            parts_asset: new_message.parts_asset,
        };
        let to_insert = row.clone();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let role = role_to_str(to_insert.role);
            let meta = serde_json::to_string(&to_insert.meta)?;
            conn.execute(
                r#"
                INSERT INTO messages (
                    id, session_id, project_id, role, created_at, meta,
                    parts_bucket, parts_key, parts_sha256, parts_etag, parts_mime, parts_size
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    to_insert.id,
                    to_insert.session_id,
                    to_insert.project_id,
                    role,
                    to_insert.created_at.to_rfc3339(),
                    meta,
                    to_insert.parts_asset.bucket,
                    to_insert.parts_asset.key,
                    to_insert.parts_asset.sha256,
                    to_insert.parts_asset.etag,
                    to_insert.parts_asset.mime,
                    to_insert.parts_asset.size as i64,
                ],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(row)
    }

    pub async fn update_meta(&self, message_id: &str, meta: serde_json::Value) -> Result<()> {
        let db = self.store.db();
        let message_id = message_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let meta_str = serde_json::to_string(&meta)?;
            conn.execute(
                "UPDATE messages SET meta = ?1 WHERE id = ?2",
                params![meta_str, message_id],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn list_all_by_session(&self, session_id: &str) -> Result<Vec<MessageRow>> {
        let db = self.store.db();
        let session_id = session_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, session_id, project_id, role, created_at, meta,
                       parts_bucket, parts_key, parts_sha256, parts_etag, parts_mime, parts_size
                FROM messages
                WHERE session_id = ?1
                ORDER BY created_at ASC, id ASC
                "#,
            )?;
            let rows = stmt.query_map(params![session_id], row_to_message)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok::<Vec<MessageRow>, anyhow::Error>(out)
        })
        .await?
    }

    /// Page of messages after `(after_created_at, after_id)` (exclusive),
    /// in `time_desc`/`time_asc` direction, `limit + 1` rows so the caller
    /// can detect `has_more` (§4.5 step 1). When `after` is `None`, starts
    /// from the beginning/end of the session depending on direction.
    pub async fn list_by_session_with_cursor(
        &self,
        session_id: &str,
        after: Option<(chrono::DateTime<chrono::Utc>, Uuid)>,
        limit: i64,
        time_desc: bool,
    ) -> Result<Vec<MessageRow>> {
        let db = self.store.db();
        let session_id = session_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let order = if time_desc { "DESC" } else { "ASC" };
            let cmp = if time_desc { "<" } else { ">" };
            let sql = format!(
                r#"
                SELECT id, session_id, project_id, role, created_at, meta,
                       parts_bucket, parts_key, parts_sha256, parts_etag, parts_mime, parts_size
                FROM messages
                WHERE session_id = ?1
                  AND (?2 IS NULL OR (created_at, id) {cmp} (?2, ?3))
                ORDER BY created_at {order}, id {order}
                LIMIT ?4
                "#
            );
            let mut stmt = conn.prepare(&sql)?;
            let after_created_at = after.map(|(ts, _)| ts.to_rfc3339());
            let after_id = after.map(|(_, id)| id.to_string());
            let rows = stmt.query_map(
                params![session_id, after_created_at, after_id, limit],
                row_to_message,
            )?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok::<Vec<MessageRow>, anyhow::Error>(out)
        })
        .await?
    }

    pub async fn get(&self, message_id: &str) -> Result<Option<MessageRow>> {
        let db = self.store.db();
        let message_id = message_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            conn.query_row(
                r#"
                SELECT id, session_id, project_id, role, created_at, meta,
                       parts_bucket, parts_key, parts_sha256, parts_etag, parts_mime, parts_size
                FROM messages WHERE id = ?1
                "#,
                params![message_id],
                row_to_message,
            )
            .optional()
            .map_err(anyhow::Error::from)
        })
        .await?
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<MessageRow> {
    let role_raw: String = row.get(3)?;
    let role = if role_raw == "assistant" { Role::Assistant } else { Role::User };
    let created_at_raw: String = row.get(4)?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());
    let meta_raw: String = row.get(5)?;
    let meta = serde_json::from_str(&meta_raw).unwrap_or(serde_json::Value::Null);
    let size: i64 = row.get(11)?;
    Ok(MessageRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        project_id: row.get(2)?,
        role,
        created_at,
        meta,
        parts_asset: Asset {
            bucket: row.get(6)?,
            key: row.get(7)?,
            sha256: row.get(8)?,
            etag: row.get(9)?,
            mime: row.get(10)?,
            size: size as u64,
        },
    })
}
