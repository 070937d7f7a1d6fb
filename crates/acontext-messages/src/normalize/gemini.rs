//! Gemini `generateContent` wire shape: a `GeminiPart::{Text,FunctionCall,
//! FunctionResponse}` tagged-enum conversion.

use acontext_schema::{CoreError, CoreResult, GeminiCallInfo, Part, PartType, Role};
use rand::Rng;
use serde_json::{json, Value};

use super::Normalized;

pub fn normalize(raw: &Value) -> CoreResult<Normalized> {
    let obj = raw.as_object().ok_or(CoreError::InvalidPart)?;
    let role_raw = obj.get("role").and_then(|v| v.as_str()).ok_or(CoreError::InvalidRole)?;
    let role = match role_raw {
        "user" => Role::User,
        "model" => Role::Assistant,
        _ => return Err(CoreError::InvalidRole),
    };

    let parts_raw = obj.get("parts").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    let mut parts = Vec::with_capacity(parts_raw.len());
    let mut call_info = Vec::new();

    for part_raw in &parts_raw {
        if let Some(text) = part_raw.get("text").and_then(|v| v.as_str()) {
            parts.push(Part::text(text));
            continue;
        }
        if let Some(inline_data) = part_raw.get("inline_data") {
            let mut p = Part { kind: PartType::Image, text: None, meta: None, asset: None, filename: None };
            let mut meta = serde_json::Map::new();
            meta.insert("inline_data".to_string(), inline_data.clone());
            if let Some(data) = inline_data.get("data").and_then(|v| v.as_str()) {
                meta.insert("inline_base64".to_string(), Value::String(data.to_string()));
            }
            if let Some(mime) = inline_data.get("mime_type").and_then(|v| v.as_str()) {
                meta.insert("inline_mime".to_string(), Value::String(mime.to_string()));
            }
            p.meta = Some(Value::Object(meta));
            parts.push(p);
            continue;
        }
        if let Some(function_call) = part_raw.get("function_call") {
            let name = function_call
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or(CoreError::InvalidFunctionName)?;
            let args = function_call.get("args").cloned().unwrap_or(json!({}));
            let id = function_call
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(synthesize_call_id);
            call_info.push(GeminiCallInfo { id: id.clone(), name: name.to_string() });
            parts.push(Part::tool_call(Some(id), name, args));
            continue;
        }
        if let Some(function_response) = part_raw.get("function_response") {
            let name = function_response
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or(CoreError::InvalidFunctionName)?;
            let response = function_response.get("response").cloned().unwrap_or(json!({}));
            // The tool_call_id is left unresolved here; the ID Resolver
            // fills it in from the session's call-info queue before the
            // row is written. A present-but-non-string id (e.g. a number)
            // is a malformed wire message, not an absent one.
            let id = match function_response.get("id") {
                None => "",
                Some(Value::String(s)) => s.as_str(),
                Some(_) => return Err(CoreError::InvalidToolCallId),
            };
            let mut p = Part::tool_result(id, Some(name.to_string()));
            p.text = Some(serde_json::to_string(&response).unwrap_or_default());
            parts.push(p);
            continue;
        }
        return Err(CoreError::InvalidPart);
    }

    let mut meta = serde_json::Map::new();
    if !call_info.is_empty() {
        meta.insert(
            acontext_schema::GEMINI_CALL_INFO_KEY.to_string(),
            serde_json::to_value(&call_info).expect("GeminiCallInfo always serializes"),
        );
    }

    Ok(Normalized { role, parts, meta: Value::Object(meta) })
}

fn synthesize_call_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8).map(|_| format!("{:x}", rng.gen_range(0..16u8))).collect();
    format!("call_{suffix}")
}

pub fn denormalize(role: Role, parts: &[Part], _meta: &Value) -> Value {
    let gemini_role = match role {
        Role::User => "user",
        Role::Assistant => "model",
    };
    let blocks: Vec<Value> = parts
        .iter()
        .filter_map(|p| match p.kind {
            PartType::Text => Some(json!({"text": p.text})),
            PartType::Image => Some(json!({"inline_data": p.meta_get("inline_data")})),
            PartType::ToolCall => Some(json!({
                "function_call": {
                    "id": p.tool_call_id_field(),
                    "name": p.tool_call_name(),
                    "args": p.meta_get("arguments"),
                }
            })),
            PartType::ToolResult => {
                let response: Value = p
                    .text
                    .as_deref()
                    .and_then(|t| serde_json::from_str(t).ok())
                    .unwrap_or(Value::Null);
                Some(json!({
                    "function_response": {
                        "id": p.tool_result_call_id(),
                        "name": p.meta_get("name"),
                        "response": response,
                    }
                }))
            }
            PartType::Thinking | PartType::Audio | PartType::Video | PartType::File | PartType::Data => None,
        })
        .collect();

    json!({ "role": gemini_role, "parts": blocks })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_call_without_id_gets_synthesized_id_and_call_info() {
        let raw = json!({
            "role": "model",
            "parts": [{"function_call": {"name": "get_weather", "args": {"city": "Paris"}}}]
        });
        let normalized = normalize(&raw).unwrap();
        assert_eq!(normalized.parts.len(), 1);
        let tool_call_id = normalized.parts[0].tool_call_id_field().unwrap();
        assert!(tool_call_id.starts_with("call_"));

        let call_info = normalized.meta.get(acontext_schema::GEMINI_CALL_INFO_KEY).unwrap();
        let entries: Vec<GeminiCallInfo> = serde_json::from_value(call_info.clone()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "get_weather");
        assert_eq!(entries[0].id, tool_call_id);
    }

    #[test]
    fn unknown_role_fails() {
        let raw = json!({"role": "system", "parts": []});
        assert_eq!(normalize(&raw).err(), Some(CoreError::InvalidRole));
    }

    #[test]
    fn function_response_with_non_string_id_fails() {
        let raw = json!({
            "role": "user",
            "parts": [{"function_response": {"id": 42, "name": "get_weather", "response": {}}}]
        });
        assert_eq!(normalize(&raw).err(), Some(CoreError::InvalidToolCallId));
    }
}
