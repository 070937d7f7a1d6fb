use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::asset::Asset;
use crate::error::{CoreError, CoreResult};

/// The closed set of part variants. Unknown `type` values fail to
/// deserialize into this enum and the failure surfaces as a normalizer
/// validation error at the caller boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PartType {
    Text,
    Image,
    Audio,
    Video,
    File,
    ToolCall,
    ToolResult,
    Data,
    Thinking,
}

/// A typed content unit within a message. Binary parts reference an Asset.
///
/// Variant-specific required meta keys (enforced by [`Part::validate`]):
/// - `tool-call`: `{name, arguments}` (+ optional `id`)
/// - `tool-result`: `{tool_call_id}` (+ optional `name`)
/// - `data`: `{data_type}`
/// - `thinking`: optional `{signature}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(rename = "type")]
    pub kind: PartType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: PartType::Text,
            text: Some(text.into()),
            meta: None,
            asset: None,
            filename: None,
        }
    }

    pub fn tool_call(id: Option<String>, name: impl Into<String>, arguments: Value) -> Self {
        let mut meta = serde_json::Map::new();
        meta.insert("name".into(), Value::String(name.into()));
        meta.insert("arguments".into(), arguments);
        if let Some(id) = id {
            meta.insert("id".into(), Value::String(id));
        }
        Self {
            kind: PartType::ToolCall,
            text: None,
            meta: Some(Value::Object(meta)),
            asset: None,
            filename: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, name: Option<String>) -> Self {
        let mut meta = serde_json::Map::new();
        meta.insert("tool_call_id".into(), Value::String(tool_call_id.into()));
        if let Some(name) = name {
            meta.insert("name".into(), Value::String(name));
        }
        Self {
            kind: PartType::ToolResult,
            text: None,
            meta: Some(Value::Object(meta)),
            asset: None,
            filename: None,
        }
    }

    fn meta_obj(&self) -> Option<&serde_json::Map<String, Value>> {
        self.meta.as_ref().and_then(|m| m.as_object())
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta_obj().and_then(|m| m.get(key)).and_then(|v| v.as_str())
    }

    pub fn meta_get(&self, key: &str) -> Option<&Value> {
        self.meta_obj().and_then(|m| m.get(key))
    }

    pub fn tool_call_name(&self) -> Option<&str> {
        self.meta_str("name")
    }

    pub fn tool_call_id_field(&self) -> Option<&str> {
        self.meta_str("id")
    }

    pub fn tool_result_call_id(&self) -> Option<&str> {
        self.meta_str("tool_call_id")
    }

    pub fn set_meta_str(&mut self, key: &str, value: impl Into<String>) {
        let meta = self
            .meta
            .get_or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Some(obj) = meta.as_object_mut() {
            obj.insert(key.to_string(), Value::String(value.into()));
        }
    }

    /// Validates that this part carries the required meta keys for its
    /// variant. Used by the `acontext` (native) normalizer, which performs
    /// no conversion — only validation.
    pub fn validate(&self) -> CoreResult<()> {
        match self.kind {
            PartType::ToolCall => {
                let name = self.meta_str("name").unwrap_or("");
                let has_args = self.meta_get("arguments").is_some();
                if name.is_empty() || !has_args {
                    return Err(CoreError::InvalidPart);
                }
            }
            PartType::ToolResult => {
                let id = self.meta_str("tool_call_id").unwrap_or("");
                if id.is_empty() {
                    return Err(CoreError::InvalidPart);
                }
            }
            PartType::Data => {
                let data_type = self.meta_str("data_type").unwrap_or("");
                if data_type.is_empty() {
                    return Err(CoreError::InvalidPart);
                }
            }
            PartType::Thinking | PartType::Text | PartType::Image | PartType::Audio
            | PartType::Video | PartType::File => {}
        }
        Ok(())
    }
}
