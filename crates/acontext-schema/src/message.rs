use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::asset::Asset;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Acontext,
    Openai,
    Anthropic,
    Gemini,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Acontext => "acontext",
            SourceFormat::Openai => "openai",
            SourceFormat::Anthropic => "anthropic",
            SourceFormat::Gemini => "gemini",
        }
    }
}

/// One Gemini tool-call record: `{id, name}`, recorded in message meta under
/// `__gemini_call_info__` for every `function_call` emitted by the message
/// (both caller-provided and synthesized IDs).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeminiCallInfo {
    pub id: String,
    pub name: String,
}

pub const GEMINI_CALL_INFO_KEY: &str = "__gemini_call_info__";
pub const SOURCE_FORMAT_KEY: &str = "source_format";
pub const NAME_KEY: &str = "name";

/// Conversation container. Owns messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub configs: Value,
    #[serde(default)]
    pub disable_task_tracking: bool,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(project_id: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            user_id,
            configs: Value::Object(Default::default()),
            disable_task_tracking: false,
            created_at: Utc::now(),
        }
    }
}

/// Immutable append-only record inside a session. The parts themselves live
/// in the blob store, referenced here only by `parts_asset`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub project_id: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub meta: Value,
    pub parts_asset: Asset,
}

impl Message {
    pub fn meta_obj_mut(&mut self) -> &mut serde_json::Map<String, Value> {
        if !self.meta.is_object() {
            self.meta = Value::Object(Default::default());
        }
        self.meta.as_object_mut().expect("just ensured object")
    }

    pub fn set_source_format(&mut self, fmt: SourceFormat) {
        self.meta_obj_mut()
            .insert(SOURCE_FORMAT_KEY.to_string(), Value::String(fmt.as_str().to_string()));
    }

    pub fn set_gemini_call_info(&mut self, info: &[GeminiCallInfo]) {
        let value = serde_json::to_value(info).expect("GeminiCallInfo always serializes");
        self.meta_obj_mut().insert(GEMINI_CALL_INFO_KEY.to_string(), value);
    }

    pub fn gemini_call_info(&self) -> Vec<GeminiCallInfo> {
        self.meta
            .as_object()
            .and_then(|m| m.get(GEMINI_CALL_INFO_KEY))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

/// A cursor pair as decoded from an opaque pagination token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}
