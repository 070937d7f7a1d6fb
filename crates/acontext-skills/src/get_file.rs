//! Resolve a skill's file by relative path, either inline (via a delegate
//! parser for plain-text MIME types) or as a presigned URL.

use acontext_blob::BlobStore;
use acontext_schema::{AgentSkill, CoreError};
use anyhow::Result;

/// Narrow collaborator boundary: anything richer than a pass-through read
/// (PDF extraction, OCR) is an external implementation of this trait, not
/// shipped here.
pub trait FileParser: Send + Sync {
    /// Whether this parser claims the given MIME type.
    fn can_parse(&self, mime: &str) -> bool;

    /// Parses raw bytes into the content returned to the caller.
    fn parse(&self, bytes: &[u8]) -> Result<String>;
}

/// The only delegate shipped here: returns plain-text bytes as-is.
pub struct PlainTextParser;

impl FileParser for PlainTextParser {
    fn can_parse(&self, mime: &str) -> bool {
        mime.starts_with("text/") || mime == "application/json" || mime == "application/yaml"
    }

    fn parse(&self, bytes: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

pub enum SkillFileContent {
    Inline(String),
    PresignedUrl(String),
}

pub async fn get_file(
    blob: &dyn BlobStore,
    parser: &dyn FileParser,
    skill: &AgentSkill,
    relative_path: &str,
    expire_secs: u64,
) -> Result<SkillFileContent> {
    let entry = skill
        .file_index
        .iter()
        .find(|e| e.path == relative_path)
        .ok_or(CoreError::SkillNotFound)?;
    let asset_meta = skill.asset_meta.as_ref().ok_or(CoreError::SkillNotFound)?;
    let key = format!("{}/{}", asset_meta.key, entry.path);

    if parser.can_parse(&entry.mime) {
        let bytes = blob.download_bytes(&key).await?;
        Ok(SkillFileContent::Inline(parser.parse(&bytes)?))
    } else {
        let url = blob.presign_get(&key, expire_secs).await?;
        Ok(SkillFileContent::PresignedUrl(url))
    }
}
