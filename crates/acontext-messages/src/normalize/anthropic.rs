//! Anthropic messages wire shape: content-block conversion
//! (`ContentBlock::{Text,ToolUse,ToolResult}`).

use acontext_schema::{CoreError, CoreResult, Part, PartType, Role};
use serde_json::{json, Value};

use super::{role_as_str, role_from_str, Normalized};

pub fn normalize(raw: &Value) -> CoreResult<Normalized> {
    let obj = raw.as_object().ok_or(CoreError::InvalidPart)?;
    let role = role_from_str(obj.get("role").and_then(|v| v.as_str()).ok_or(CoreError::InvalidRole)?)?;

    let content = obj.get("content").cloned().unwrap_or(Value::Null);
    let blocks: Vec<Value> = match content {
        Value::String(text) => vec![json!({"type": "text", "text": text})],
        Value::Array(items) => items,
        _ => Vec::new(),
    };

    let mut parts = Vec::with_capacity(blocks.len());
    for block in &blocks {
        if let Some(part) = block_to_part(block)? {
            parts.push(part);
        }
    }

    Ok(Normalized { role, parts, meta: Value::Object(Default::default()) })
}

fn block_to_part(block: &Value) -> CoreResult<Option<Part>> {
    let kind = block.get("type").and_then(|v| v.as_str()).ok_or(CoreError::InvalidPart)?;
    let cache_control = block.get("cache_control").cloned();

    let mut part = match kind {
        "text" => Part::text(block.get("text").and_then(|v| v.as_str()).unwrap_or("")),
        "image" => binary_block_part(PartType::Image, block),
        "document" => binary_block_part(PartType::File, block),
        "tool_use" => {
            let id = block.get("id").and_then(|v| v.as_str()).map(str::to_string);
            let name = block.get("name").and_then(|v| v.as_str()).ok_or(CoreError::InvalidPart)?;
            let input = block.get("input").cloned().unwrap_or(json!({}));
            let mut p = Part::tool_call(id, name, input);
            p.set_meta_str("source_type", "tool_use");
            p
        }
        "tool_result" => {
            let tool_use_id = block
                .get("tool_use_id")
                .and_then(|v| v.as_str())
                .ok_or(CoreError::InvalidToolCallId)?;
            let mut p = Part::tool_result(tool_use_id, None);
            p.text = Some(content_to_text(block.get("content")));
            if let Some(is_error) = block.get("is_error") {
                let meta = p.meta.get_or_insert_with(|| Value::Object(Default::default()));
                if let Some(obj) = meta.as_object_mut() {
                    obj.insert("is_error".to_string(), is_error.clone());
                }
            }
            p
        }
        "thinking" => {
            let mut p = Part {
                kind: PartType::Thinking,
                text: block.get("thinking").and_then(|v| v.as_str()).map(str::to_string),
                meta: None,
                asset: None,
                filename: None,
            };
            if let Some(signature) = block.get("signature").and_then(|v| v.as_str()) {
                p.set_meta_str("signature", signature);
            }
            p
        }
        "redacted_thinking" => return Ok(None),
        _ => return Err(CoreError::InvalidPart),
    };

    if let Some(cache_control) = cache_control {
        let meta = part.meta.get_or_insert_with(|| Value::Object(Default::default()));
        if let Some(obj) = meta.as_object_mut() {
            obj.insert("cache_control".to_string(), cache_control);
        }
    }

    Ok(Some(part))
}

/// `image`/`document` blocks carry a `source` object that is either
/// `{type: "base64", media_type, data}` or `{type: "url", url}`. The
/// base64 payload, when present, is flattened to `inline_base64`/
/// `inline_mime` so the storage layer can upload it without knowing each
/// provider's nesting.
fn binary_block_part(kind: PartType, block: &Value) -> Part {
    let mut p = Part { kind, text: None, meta: None, asset: None, filename: None };
    let source = block.get("source").cloned();
    let mut meta = serde_json::Map::new();
    if let Some(source) = &source {
        meta.insert("source".to_string(), source.clone());
        if source.get("type").and_then(|v| v.as_str()) == Some("base64") {
            if let Some(data) = source.get("data").and_then(|v| v.as_str()) {
                meta.insert("inline_base64".to_string(), Value::String(data.to_string()));
            }
            if let Some(mime) = source.get("media_type").and_then(|v| v.as_str()) {
                meta.insert("inline_mime".to_string(), Value::String(mime.to_string()));
            }
        }
    }
    p.meta = Some(Value::Object(meta));
    p
}

fn content_to_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|b| b.get("text").and_then(|v| v.as_str()))
            .collect::<Vec<_>>()
            .join(""),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

pub fn denormalize(role: Role, parts: &[Part], _meta: &Value) -> Value {
    let blocks: Vec<Value> = parts
        .iter()
        .filter_map(|p| match p.kind {
            PartType::Text => Some(json!({"type": "text", "text": p.text})),
            PartType::Image => Some(json!({"type": "image", "source": p.meta_get("source")})),
            PartType::File => Some(json!({"type": "document", "source": p.meta_get("source")})),
            PartType::ToolCall => Some(json!({
                "type": "tool_use",
                "id": p.tool_call_id_field(),
                "name": p.tool_call_name(),
                "input": p.meta_get("arguments"),
            })),
            PartType::ToolResult => Some(json!({
                "type": "tool_result",
                "tool_use_id": p.tool_result_call_id(),
                "content": p.text,
                "is_error": p.meta_get("is_error"),
            })),
            PartType::Thinking => Some(json!({
                "type": "thinking",
                "thinking": p.text,
                "signature": p.meta_get("signature"),
            })),
            PartType::Audio | PartType::Video | PartType::Data => None,
        })
        .collect();

    json!({ "role": role_as_str(role), "content": blocks })
}
