//! Native format: validates each part against its variant-specific
//! required keys; performs no conversion.

use acontext_schema::{CoreError, CoreResult, Part, Role};
use serde_json::Value;

use super::{role_as_str, role_from_str, Normalized};

pub fn normalize(raw: &Value) -> CoreResult<Normalized> {
    let obj = raw.as_object().ok_or(CoreError::InvalidPart)?;
    let role = obj
        .get("role")
        .and_then(|v| v.as_str())
        .ok_or(CoreError::InvalidRole)?;
    let role = role_from_str(role)?;

    let parts_raw = obj.get("parts").and_then(|v| v.as_array()).ok_or(CoreError::InvalidPart)?;
    let mut parts = Vec::with_capacity(parts_raw.len());
    for part_raw in parts_raw {
        let part: Part = serde_json::from_value(part_raw.clone()).map_err(|_| CoreError::InvalidPart)?;
        part.validate()?;
        parts.push(part);
    }

    let meta = obj.get("meta").cloned().unwrap_or(Value::Object(Default::default()));
    Ok(Normalized { role, parts, meta })
}

pub fn denormalize(role: Role, parts: &[Part], meta: &Value) -> Value {
    serde_json::json!({
        "role": role_as_str(role),
        "parts": parts,
        "meta": meta,
    })
}
