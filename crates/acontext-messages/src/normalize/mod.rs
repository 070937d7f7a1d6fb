//! Per-format message normalizers: per-provider wire DTOs converted to and
//! from a tagged-content internal part representation.

mod acontext;
mod anthropic;
mod gemini;
mod openai;

use acontext_schema::{CoreError, CoreResult, Part, Role, SourceFormat};
use serde_json::Value;

/// Normalized form: role, ordered parts, and the message-level meta object
/// a normalizer wants attached (e.g. Gemini's synthesized call-info list).
pub struct Normalized {
    pub role: Role,
    pub parts: Vec<Part>,
    pub meta: Value,
}

/// Normalize an opaque wire message of the given source format into the
/// internal representation. `raw` is the provider-shaped message body.
pub fn normalize(format: SourceFormat, raw: &Value) -> CoreResult<Normalized> {
    match format {
        SourceFormat::Acontext => acontext::normalize(raw),
        SourceFormat::Openai => openai::normalize(raw),
        SourceFormat::Anthropic => anthropic::normalize(raw),
        SourceFormat::Gemini => gemini::normalize(raw),
    }
}

/// Inverse projection (Denormalize): internal representation back to a
/// given provider's wire shape. Mirrors the per-format rules; unknown or
/// foreign variants are carried through as opaque data rather than dropped.
pub fn denormalize(format: SourceFormat, role: Role, parts: &[Part], meta: &Value) -> Value {
    match format {
        SourceFormat::Acontext => acontext::denormalize(role, parts, meta),
        SourceFormat::Openai => openai::denormalize(role, parts, meta),
        SourceFormat::Anthropic => anthropic::denormalize(role, parts, meta),
        SourceFormat::Gemini => gemini::denormalize(role, parts, meta),
    }
}

pub(crate) fn role_from_str(raw: &str) -> CoreResult<Role> {
    match raw {
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        _ => Err(CoreError::InvalidRole),
    }
}

pub(crate) fn role_as_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}
