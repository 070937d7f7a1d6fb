//! `SKILL.md` YAML frontmatter: `---`-delimited parsing.

use acontext_schema::CoreError;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SkillFrontmatter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Parses the YAML between the first two `---` markers. Both `name` and
/// `description` must be non-empty once parsed.
pub fn parse(raw: &str) -> Result<SkillFrontmatter, CoreError> {
    let trimmed = raw.trim_start();
    let after_first = trimmed.strip_prefix("---").ok_or(CoreError::SkillMissingSkillMd)?;
    let end = after_first.find("---").ok_or(CoreError::SkillMissingSkillMd)?;
    let yaml_str = &after_first[..end];
    let fm: SkillFrontmatter = serde_yaml::from_str(yaml_str).map_err(|_| CoreError::SkillMissingSkillMd)?;
    if fm.name.trim().is_empty() {
        return Err(CoreError::SkillNameRequired);
    }
    if fm.description.trim().is_empty() {
        return Err(CoreError::SkillDescriptionRequired);
    }
    Ok(fm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_frontmatter() {
        let raw = "---\nname: pdf-reader\ndescription: reads pdfs\n---\nbody text";
        let fm = parse(raw).unwrap();
        assert_eq!(fm.name, "pdf-reader");
        assert_eq!(fm.description, "reads pdfs");
    }

    #[test]
    fn rejects_missing_name() {
        let raw = "---\ndescription: reads pdfs\n---\n";
        assert_eq!(parse(raw).unwrap_err(), CoreError::SkillNameRequired);
    }

    #[test]
    fn rejects_missing_frontmatter_delimiter() {
        let raw = "# no frontmatter here";
        assert_eq!(parse(raw).unwrap_err(), CoreError::SkillMissingSkillMd);
    }
}
