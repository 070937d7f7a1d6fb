//! Ordered, parameterized transformations applied to a chronologically
//! sorted message list before delivery.

use acontext_schema::{Part, PartType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditStrategy {
    RemoveToolResult { keep_recent_n_tool_results: usize },
    TokenLimit { limit_tokens: usize },
}

/// A message reduced to what the edit pipeline needs: identity, ordering,
/// and a mutable parts list.
#[derive(Debug, Clone)]
pub struct EditableMessage {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub parts: Vec<Part>,
}

/// Runs the pipeline. `pin_message_id`, when it names a message present in
/// `messages`, freezes it and everything chronologically after it; the
/// strategies only ever touch the older prefix. Returns the edited list and
/// `edit_at_message_id` (the pin if given, else the last surviving
/// message's ID, else empty for an empty result).
pub fn apply(
    messages: Vec<EditableMessage>,
    strategies: &[EditStrategy],
    pin_message_id: Option<&str>,
) -> (Vec<EditableMessage>, String) {
    let pin_idx = pin_message_id.and_then(|pin| messages.iter().position(|m| m.id == pin));

    let (mut editable, pinned): (Vec<EditableMessage>, Vec<EditableMessage>) = match pin_idx {
        Some(idx) => {
            let mut iter = messages.into_iter();
            let editable: Vec<_> = iter.by_ref().take(idx).collect();
            let pinned: Vec<_> = iter.collect();
            (editable, pinned)
        }
        None => (messages, Vec::new()),
    };

    for strategy in strategies {
        match strategy {
            EditStrategy::RemoveToolResult { keep_recent_n_tool_results } => {
                apply_remove_tool_result(&mut editable, *keep_recent_n_tool_results);
            }
            EditStrategy::TokenLimit { limit_tokens } => {
                apply_token_limit(&mut editable, &pinned, *limit_tokens);
            }
        }
    }

    editable.extend(pinned);

    let edit_at_message_id = match pin_message_id {
        Some(pin) => pin.to_string(),
        None => editable.last().map(|m| m.id.clone()).unwrap_or_default(),
    };

    (editable, edit_at_message_id)
}

fn apply_remove_tool_result(messages: &mut [EditableMessage], keep_recent_n: usize) {
    let total: usize = messages.iter().flat_map(|m| m.parts.iter()).filter(|p| p.kind == PartType::ToolResult).count();
    let drop_count = total.saturating_sub(keep_recent_n);
    if drop_count == 0 {
        return;
    }

    let mut dropped_so_far = 0;
    for message in messages.iter_mut() {
        if dropped_so_far >= drop_count {
            break;
        }
        message.parts.retain(|part| {
            if part.kind == PartType::ToolResult && dropped_so_far < drop_count {
                dropped_so_far += 1;
                false
            } else {
                true
            }
        });
    }
}

fn apply_token_limit(editable: &mut Vec<EditableMessage>, pinned: &[EditableMessage], limit_tokens: usize) {
    let pinned_tokens: usize = pinned.iter().map(|m| estimate_tokens(&m.parts)).sum();

    while !editable.is_empty() {
        let editable_tokens: usize = editable.iter().map(|m| estimate_tokens(&m.parts)).sum();
        if editable_tokens + pinned_tokens <= limit_tokens {
            break;
        }
        editable.remove(0);
    }
}

/// Rough token estimator: ~4 characters per token, summed over text content
/// and a fixed per-part overhead for structured (tool-call/tool-result)
/// metadata. Good enough for budget trimming, not for precise accounting.
fn estimate_tokens(parts: &[Part]) -> usize {
    parts
        .iter()
        .map(|p| {
            let text_len = p.text.as_deref().map(str::len).unwrap_or(0);
            let meta_len = p.meta.as_ref().map(|m| m.to_string().len()).unwrap_or(0);
            (text_len + meta_len) / 4 + 4
        })
        .sum()
}
