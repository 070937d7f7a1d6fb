//! Opaque pagination cursor: base64-url-safe encoding of `(created_at, id)`.
//! A bad cursor is always a client error, never an internal one.

use acontext_schema::{CoreError, CoreResult, Cursor};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub fn encode(created_at: DateTime<Utc>, id: Uuid) -> String {
    let raw = format!("{}|{}", created_at.to_rfc3339(), id);
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

pub fn decode(cursor: &str) -> CoreResult<Cursor> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor.as_bytes())
        .map_err(|_| CoreError::CursorDecodeFailed)?;
    let raw = String::from_utf8(bytes).map_err(|_| CoreError::CursorDecodeFailed)?;
    let (ts_raw, id_raw) = raw.split_once('|').ok_or(CoreError::CursorDecodeFailed)?;
    let created_at = DateTime::parse_from_rfc3339(ts_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CoreError::CursorDecodeFailed)?;
    let id = Uuid::parse_str(id_raw).map_err(|_| CoreError::CursorDecodeFailed)?;
    Ok(Cursor { created_at, id })
}
