//! OpenAI chat-completions wire shape, in the same discriminated
//! `ContentBlock` style as the other per-provider normalizers.

use acontext_schema::{CoreError, CoreResult, Part, PartType, Role};
use serde_json::{json, Value};

use super::Normalized;

pub fn normalize(raw: &Value) -> CoreResult<Normalized> {
    let obj = raw.as_object().ok_or(CoreError::InvalidPart)?;
    let role_raw = obj.get("role").and_then(|v| v.as_str()).ok_or(CoreError::InvalidRole)?;

    match role_raw {
        "user" => normalize_user(obj),
        "assistant" => normalize_assistant(obj),
        "tool" => normalize_tool(obj),
        "function" => normalize_function(obj),
        _ => Err(CoreError::InvalidRole),
    }
}

fn normalize_user(obj: &serde_json::Map<String, Value>) -> CoreResult<Normalized> {
    let content = obj.get("content").cloned().unwrap_or(Value::Null);
    let parts = match content {
        Value::String(text) => vec![Part::text(text)],
        Value::Array(items) => items.iter().filter_map(user_block_to_part).collect(),
        _ => Vec::new(),
    };
    Ok(Normalized { role: Role::User, parts, meta: Value::Object(Default::default()) })
}

/// A `data:<mime>;base64,<payload>` URI as used by `image_url.url` and
/// equivalent inline fields; flattened to `inline_base64`/`inline_mime` so
/// the storage layer can upload it uniformly across formats.
fn split_data_uri(uri: &str) -> Option<(String, String)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(",")?;
    let mime = header.strip_suffix(";base64")?.to_string();
    Some((mime, payload.to_string()))
}

fn user_block_to_part(block: &Value) -> Option<Part> {
    let kind = block.get("type")?.as_str()?;
    match kind {
        "text" => Some(Part::text(block.get("text")?.as_str()?.to_string())),
        "image_url" => {
            let mut part = Part { kind: PartType::Image, text: None, meta: None, asset: None, filename: None };
            let mut meta = serde_json::Map::new();
            meta.insert("image_url".to_string(), block.get("image_url").cloned().unwrap_or(Value::Null));
            if let Some(url) = block.get("image_url").and_then(|v| v.get("url")).and_then(|v| v.as_str()) {
                if let Some((mime, data)) = split_data_uri(url) {
                    meta.insert("inline_base64".to_string(), Value::String(data));
                    meta.insert("inline_mime".to_string(), Value::String(mime));
                }
            }
            part.meta = Some(Value::Object(meta));
            Some(part)
        }
        "input_audio" => {
            let mut part = Part { kind: PartType::Audio, text: None, meta: None, asset: None, filename: None };
            let mut meta = serde_json::Map::new();
            meta.insert("input_audio".to_string(), block.get("input_audio").cloned().unwrap_or(Value::Null));
            if let Some(data) = block.get("input_audio").and_then(|v| v.get("data")).and_then(|v| v.as_str()) {
                meta.insert("inline_base64".to_string(), Value::String(data.to_string()));
            }
            if let Some(format) = block.get("input_audio").and_then(|v| v.get("format")).and_then(|v| v.as_str()) {
                meta.insert("inline_mime".to_string(), Value::String(format!("audio/{format}")));
            }
            part.meta = Some(Value::Object(meta));
            Some(part)
        }
        "file" => {
            let mut part = Part { kind: PartType::File, text: None, meta: None, asset: None, filename: None };
            part.meta = Some(json!({ "file": block.get("file").cloned() }));
            Some(part)
        }
        _ => None,
    }
}

fn normalize_assistant(obj: &serde_json::Map<String, Value>) -> CoreResult<Normalized> {
    let mut parts = Vec::new();

    match obj.get("content") {
        Some(Value::String(text)) if !text.is_empty() => parts.push(Part::text(text.clone())),
        _ => {}
    }
    if let Some(refusal) = obj.get("refusal").and_then(|v| v.as_str()) {
        let mut part = Part::text(refusal);
        part.meta = Some(json!({ "refusal": true }));
        parts.push(part);
    }

    if let Some(tool_calls) = obj.get("tool_calls").and_then(|v| v.as_array()) {
        for call in tool_calls {
            let id = call.get("id").and_then(|v| v.as_str()).map(str::to_string);
            let function = call.get("function").ok_or(CoreError::InvalidPart)?;
            let name = function.get("name").and_then(|v| v.as_str()).ok_or(CoreError::InvalidPart)?;
            let arguments_str = function.get("arguments").and_then(|v| v.as_str()).unwrap_or("{}");
            let mut part = Part::tool_call(id, name, Value::String(arguments_str.to_string()));
            part.set_meta_str("source_type", "function");
            parts.push(part);
        }
    }

    Ok(Normalized { role: Role::Assistant, parts, meta: Value::Object(Default::default()) })
}

fn normalize_tool(obj: &serde_json::Map<String, Value>) -> CoreResult<Normalized> {
    let tool_call_id = obj
        .get("tool_call_id")
        .and_then(|v| v.as_str())
        .ok_or(CoreError::InvalidToolCallId)?;
    let content = content_to_text(obj.get("content"));
    let mut part = Part::tool_result(tool_call_id, None);
    part.text = Some(content);
    Ok(Normalized { role: Role::User, parts: vec![part], meta: Value::Object(Default::default()) })
}

fn normalize_function(obj: &serde_json::Map<String, Value>) -> CoreResult<Normalized> {
    let name = obj.get("name").and_then(|v| v.as_str()).ok_or(CoreError::InvalidFunctionName)?;
    let content = content_to_text(obj.get("content"));
    // The deprecated `function` role has no call ID concept; the function
    // name doubles as the correlation key so `tool-result`'s non-empty
    // `tool_call_id` invariant still holds.
    let mut part = Part::tool_result(name, Some(name.to_string()));
    part.set_meta_str("function_name", name);
    part.text = Some(content);
    Ok(Normalized { role: Role::User, parts: vec![part], meta: Value::Object(Default::default()) })
}

fn content_to_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

pub fn denormalize(role: Role, parts: &[Part], _meta: &Value) -> Value {
    match role {
        Role::User => {
            if let Some(tool_result) = parts.iter().find(|p| p.kind == PartType::ToolResult) {
                return json!({
                    "role": "tool",
                    "tool_call_id": tool_result.tool_result_call_id(),
                    "content": tool_result.text,
                });
            }
            let content: Vec<Value> = parts
                .iter()
                .map(|p| match p.kind {
                    PartType::Text => json!({"type": "text", "text": p.text}),
                    PartType::Image => json!({"type": "image_url", "image_url": p.meta_get("image_url")}),
                    PartType::Audio => json!({"type": "input_audio", "input_audio": p.meta_get("input_audio")}),
                    PartType::File => json!({"type": "file", "file": p.meta_get("file")}),
                    _ => json!({"type": "text", "text": p.text}),
                })
                .collect();
            json!({ "role": "user", "content": content })
        }
        Role::Assistant => {
            let text: String = parts
                .iter()
                .filter(|p| p.kind == PartType::Text)
                .filter_map(|p| p.text.clone())
                .collect::<Vec<_>>()
                .join("");
            let tool_calls: Vec<Value> = parts
                .iter()
                .filter(|p| p.kind == PartType::ToolCall)
                .map(|p| {
                    json!({
                        "id": p.tool_call_id_field(),
                        "type": "function",
                        "function": {
                            "name": p.tool_call_name(),
                            "arguments": p.meta_get("arguments"),
                        }
                    })
                })
                .collect();
            let mut out = json!({ "role": "assistant", "content": text });
            if !tool_calls.is_empty() {
                out["tool_calls"] = Value::Array(tool_calls);
            }
            out
        }
    }
}
