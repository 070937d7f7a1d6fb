//! Phase 1 of skill ingest: in-memory ZIP scan. Stays entirely in memory (no
//! filesystem writes) since the scan phase only inspects the archive.

use std::io::{Cursor, Read};

use acontext_schema::CoreError;

use crate::frontmatter::{self, SkillFrontmatter};

pub struct ScannedEntry {
    pub relative_path: String,
    pub bytes: Vec<u8>,
    pub mime: String,
}

pub struct ScanResult {
    pub frontmatter: SkillFrontmatter,
    pub entries: Vec<ScannedEntry>,
}

fn is_system_noise(relative_path: &str) -> bool {
    if relative_path.starts_with("__MACOSX/") {
        return true;
    }
    let basename = relative_path.rsplit('/').next().unwrap_or(relative_path);
    basename.starts_with("._") || basename == ".DS_Store"
}

/// Loads the whole archive into memory and scans it. Never writes to disk.
pub fn scan(zip_bytes: &[u8]) -> Result<ScanResult, CoreError> {
    let reader = Cursor::new(zip_bytes);
    let mut archive = zip::ZipArchive::new(reader).map_err(|_| CoreError::SkillMissingSkillMd)?;

    let mut raw_entries: Vec<(String, Vec<u8>)> = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|_| CoreError::SkillMissingSkillMd)?;
        if file.is_dir() {
            continue;
        }
        let Some(enclosed) = file.enclosed_name().map(|p| p.to_path_buf()) else {
            continue;
        };
        let relative_path = enclosed.to_string_lossy().replace('\\', "/");
        if is_system_noise(&relative_path) {
            continue;
        }
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|_| CoreError::SkillMissingSkillMd)?;
        raw_entries.push((relative_path, bytes));
    }

    let stripped_prefix = common_outermost_prefix(&raw_entries);
    let mut entries: Vec<ScannedEntry> = raw_entries
        .into_iter()
        .map(|(path, bytes)| {
            let relative_path = match &stripped_prefix {
                Some(prefix) => path.strip_prefix(prefix.as_str()).unwrap_or(&path).to_string(),
                None => path,
            };
            let mime = detect_mime(&relative_path, &bytes);
            ScannedEntry { relative_path, bytes, mime }
        })
        .collect();

    let skill_md = entries
        .iter()
        .find(|e| e.relative_path.rsplit('/').next().unwrap_or("").eq_ignore_ascii_case("SKILL.md"))
        .ok_or(CoreError::SkillMissingSkillMd)?;
    let raw_text = String::from_utf8_lossy(&skill_md.bytes).to_string();
    let frontmatter = frontmatter::parse(&raw_text)?;

    // Entries keep original archive scan order.
    Ok(ScanResult { frontmatter, entries })
}

/// If every entry starts with the same top-level path segment, returns
/// `"<segment>/"` so callers can strip it.
fn common_outermost_prefix(entries: &[(String, Vec<u8>)]) -> Option<String> {
    let mut segments = entries.iter().map(|(path, _)| path.split('/').next().unwrap_or(""));
    let first = segments.next()?;
    if first.is_empty() {
        return None;
    }
    if segments.all(|s| s == first) && entries.iter().all(|(p, _)| p.contains('/')) {
        Some(format!("{first}/"))
    } else {
        None
    }
}

fn detect_mime(relative_path: &str, bytes: &[u8]) -> String {
    if let Some(guess) = mime_guess::from_path(relative_path).first() {
        return guess.essence_str().to_string();
    }
    if std::str::from_utf8(bytes).is_ok() {
        "text/plain".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options: FileOptions<()> = FileOptions::default();
            for (name, content) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn scans_a_simple_skill_without_outer_directory() {
        let zip = build_zip(&[
            ("SKILL.md", "---\nname: pdf-reader\ndescription: reads pdfs\n---\nbody"),
            ("script.py", "print('hi')"),
        ]);
        let result = scan(&zip).unwrap();
        assert_eq!(result.frontmatter.name, "pdf-reader");
        assert_eq!(result.entries.len(), 2);
    }

    #[test]
    fn strips_common_outer_directory_and_skips_macos_noise() {
        let zip = build_zip(&[
            ("pdf-reader/SKILL.md", "---\nname: pdf-reader\ndescription: reads pdfs\n---\n"),
            ("pdf-reader/script.py", "print('hi')"),
            ("__MACOSX/pdf-reader/._SKILL.md", "junk"),
            ("pdf-reader/.DS_Store", "junk"),
        ]);
        let result = scan(&zip).unwrap();
        let paths: Vec<&str> = result.entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["SKILL.md", "script.py"]);
    }

    #[test]
    fn missing_skill_md_fails() {
        let zip = build_zip(&[("readme.txt", "no skill here")]);
        assert_eq!(scan(&zip).unwrap_err(), CoreError::SkillMissingSkillMd);
    }
}
