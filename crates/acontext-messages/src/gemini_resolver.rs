//! Cross-message FunctionCall/FunctionResponse matching. Runs before any
//! blob upload so validation failures never orphan assets.

use acontext_schema::{CoreError, CoreResult, Part, PartType};
use acontext_store::GeminiCallQueueRepo;
use anyhow::Result;

/// Resolves every `tool-result` part's `tool_call_id` against the
/// session's FIFO call-info queue, in place. Must be called only for
/// messages whose source_format is gemini.
pub async fn resolve(queue: &GeminiCallQueueRepo, session_id: &str, parts: &mut [Part]) -> Result<()> {
    for part in parts.iter_mut() {
        if part.kind != PartType::ToolResult {
            continue;
        }
        resolve_one(queue, session_id, part).await?;
    }
    Ok(())
}

async fn resolve_one(queue: &GeminiCallQueueRepo, session_id: &str, part: &mut Part) -> Result<()> {
    let name = part.meta_str("name").filter(|n| !n.is_empty()).ok_or(CoreError::InvalidFunctionName)?;
    let name = name.to_string();

    let (popped_id, popped_name) = queue
        .pop(session_id)
        .await?
        .ok_or(CoreError::NoAvailableCallInfo)?;

    if popped_name != name {
        return Err(CoreError::FunctionNameMismatch.into());
    }

    match part.meta_get("tool_call_id") {
        Some(serde_json::Value::String(existing)) if !existing.is_empty() => {
            if *existing != popped_id {
                return Err(CoreError::FunctionIdMismatch.into());
            }
        }
        Some(serde_json::Value::String(_)) | None => {
            part.set_meta_str("tool_call_id", popped_id);
        }
        Some(_) => return Err(CoreError::InvalidToolCallId.into()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use acontext_schema::GeminiCallInfo;
    use acontext_store::Store;

    #[tokio::test]
    async fn fills_in_missing_tool_call_id_from_queue() {
        let store = Store::open_in_memory().unwrap();
        let queue = store.gemini_call_queue();
        queue
            .push("s1", &[GeminiCallInfo { id: "call_abc".into(), name: "get_weather".into() }])
            .await
            .unwrap();

        let mut part = Part::tool_result("", Some("get_weather".to_string()));
        resolve(&queue, "s1", std::slice::from_mut(&mut part)).await.unwrap();
        assert_eq!(part.tool_result_call_id(), Some("call_abc"));
    }

    #[tokio::test]
    async fn name_mismatch_fails() {
        let store = Store::open_in_memory().unwrap();
        let queue = store.gemini_call_queue();
        queue
            .push("s1", &[GeminiCallInfo { id: "call_abc".into(), name: "get_weather".into() }])
            .await
            .unwrap();

        let mut part = Part::tool_result("", Some("wrong".to_string()));
        let err = resolve(&queue, "s1", std::slice::from_mut(&mut part)).await.unwrap_err();
        assert_eq!(err.downcast_ref::<CoreError>(), Some(&CoreError::FunctionNameMismatch));
    }

    #[tokio::test]
    async fn empty_queue_fails_with_no_available_call_info() {
        let store = Store::open_in_memory().unwrap();
        let queue = store.gemini_call_queue();
        let mut part = Part::tool_result("", Some("get_weather".to_string()));
        let err = resolve(&queue, "s1", std::slice::from_mut(&mut part)).await.unwrap_err();
        assert_eq!(err.downcast_ref::<CoreError>(), Some(&CoreError::NoAvailableCallInfo));
    }

    #[tokio::test]
    async fn mismatched_explicit_tool_call_id_fails() {
        let store = Store::open_in_memory().unwrap();
        let queue = store.gemini_call_queue();
        queue
            .push("s1", &[GeminiCallInfo { id: "call_abc".into(), name: "get_weather".into() }])
            .await
            .unwrap();

        let mut part = Part::tool_result("call_wrong", Some("get_weather".to_string()));
        let err = resolve(&queue, "s1", std::slice::from_mut(&mut part)).await.unwrap_err();
        assert_eq!(err.downcast_ref::<CoreError>(), Some(&CoreError::FunctionIdMismatch));
    }
}
