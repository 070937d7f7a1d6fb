use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of a skill's file index: a path relative to `AssetMeta.key`,
/// never beginning with a leading separator, plus its detected MIME type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkillFileEntry {
    pub path: String,
    pub mime: String,
}

/// Blob directory prefix for a skill's materialized files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkillAssetMeta {
    pub bucket: String,
    pub key: String,
}

/// A reusable capability bundle. `Name` is extracted from the package's
/// required `SKILL.md` frontmatter and is never partially updated after
/// ingest completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub meta: Value,
    #[serde(default)]
    pub asset_meta: Option<SkillAssetMeta>,
    #[serde(default)]
    pub file_index: Vec<SkillFileEntry>,
}

/// Sanitize a skill name into an ASCII-safe identifier: whitespace and
/// filesystem-hostile characters become `-`.
pub fn sanitize_skill_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' | '\t' | '\n' | '\r' => '-',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_hostile_characters() {
        assert_eq!(sanitize_skill_name("pdf reader/tool:v2"), "pdf-reader-tool-v2");
    }

    #[test]
    fn sanitize_leaves_plain_names_alone() {
        assert_eq!(sanitize_skill_name("pdf-reader"), "pdf-reader");
    }
}
