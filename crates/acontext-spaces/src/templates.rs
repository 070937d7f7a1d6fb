//! Embedded default-skill templates: `#[derive(Embed)]` over skill template
//! directories compiled directly into the binary.

use acontext_schema::CoreError;
use acontext_skills::{ScanResult, ScannedEntry};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "templates"]
struct Templates;

/// The default-skill path list bootstrapped into every new learning space.
pub const DEFAULT_SKILL_DIRS: &[&str] = &["onboarding", "summarizing"];

/// Reads every embedded file under `dir` and assembles it into a
/// `ScanResult`, mirroring what `acontext_skills::scan::scan` produces for an
/// uploaded ZIP so both paths can share `create_from_scanned`.
pub fn scan_template(dir: &str) -> Result<ScanResult, CoreError> {
    let prefix = format!("{dir}/");
    let mut entries = Vec::new();
    for path in Templates::iter() {
        let Some(relative_path) = path.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let file = Templates::get(&path).ok_or(CoreError::SkillMissingSkillMd)?;
        let mime = mime_guess::from_path(relative_path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "text/plain".to_string());
        entries.push(ScannedEntry {
            relative_path: relative_path.to_string(),
            bytes: file.data.into_owned(),
            mime,
        });
    }

    let skill_md = entries
        .iter()
        .find(|e| e.relative_path.eq_ignore_ascii_case("SKILL.md"))
        .ok_or(CoreError::SkillMissingSkillMd)?;
    let raw_text = String::from_utf8_lossy(&skill_md.bytes).to_string();
    let frontmatter = acontext_skills::frontmatter::parse(&raw_text)?;

    Ok(ScanResult { frontmatter, entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_default_template_dir_scans_cleanly() {
        for dir in DEFAULT_SKILL_DIRS {
            let result = scan_template(dir).unwrap();
            assert!(!result.frontmatter.name.is_empty());
            assert!(result.entries.len() >= 2);
        }
    }
}
