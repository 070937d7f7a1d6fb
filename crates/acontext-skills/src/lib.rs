pub mod frontmatter;
pub mod get_file;
pub mod ingest;
pub mod scan;

pub use frontmatter::SkillFrontmatter;
pub use get_file::{get_file, FileParser, PlainTextParser, SkillFileContent};
pub use ingest::{create_from_scanned, ingest_skill, IngestSkillRequest};
pub use scan::{scan, ScanResult, ScannedEntry};

#[cfg(test)]
mod tests {
    use super::*;
    use acontext_blob::BlobStore;
    use acontext_schema::{Asset, CoreError};
    use acontext_store::Store;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::io::{Cursor, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
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

    /// Fails every upload past the first `fail_after` successful ones, so a
    /// multi-file skill's materialize phase can be made to fail partway
    /// through without depending on filesystem permission quirks.
    struct FlakyBlobStore {
        inner: acontext_blob::FsBlobStore,
        fail_after: usize,
        uploaded: AtomicUsize,
    }

    #[async_trait]
    impl BlobStore for FlakyBlobStore {
        async fn upload_bytes(&self, key: &str, bytes: Vec<u8>, mime: &str) -> Result<Asset> {
            let count = self.uploaded.fetch_add(1, Ordering::SeqCst);
            if count >= self.fail_after {
                anyhow::bail!("simulated upload failure for {key}");
            }
            self.inner.upload_bytes(key, bytes, mime).await
        }

        async fn download_bytes(&self, key: &str) -> Result<Vec<u8>> {
            self.inner.download_bytes(key).await
        }

        async fn presign_get(&self, key: &str, expire_secs: u64) -> Result<String> {
            self.inner.presign_get(key, expire_secs).await
        }

        async fn delete_by_prefix(&self, prefix: &str) -> Result<()> {
            self.inner.delete_by_prefix(prefix).await
        }
    }

    #[tokio::test]
    async fn ingest_rolls_back_skill_row_and_partial_uploads_on_failure() {
        let dir = TempDir::new().unwrap();
        let blob: std::sync::Arc<dyn BlobStore> = std::sync::Arc::new(FlakyBlobStore {
            inner: acontext_blob::FsBlobStore::new(dir.path()),
            fail_after: 1,
            uploaded: AtomicUsize::new(0),
        });
        let store = Store::open_in_memory().unwrap();

        let zip = build_zip(&[
            ("SKILL.md", "---\nname: flaky\ndescription: d\n---\n"),
            ("a.txt", "a"),
            ("b.txt", "b"),
            ("c.txt", "c"),
        ]);

        let err = ingest_skill(
            &store,
            blob,
            IngestSkillRequest {
                project_id: "p1".to_string(),
                user_id: None,
                zip_bytes: zip,
                meta: serde_json::json!({}),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("simulated upload failure"));

        assert!(store.skills().get_by_name("p1", "flaky").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_file_resolves_a_materialized_skill_file() {
        let dir = TempDir::new().unwrap();
        let blob: std::sync::Arc<dyn BlobStore> = std::sync::Arc::new(acontext_blob::FsBlobStore::new(dir.path()));
        let store = Store::open_in_memory().unwrap();

        let zip = build_zip(&[
            ("SKILL.md", "---\nname: reader\ndescription: d\n---\n"),
            ("notes.txt", "hello world"),
        ]);

        let skill = ingest_skill(
            &store,
            blob.clone(),
            IngestSkillRequest {
                project_id: "p1".to_string(),
                user_id: None,
                zip_bytes: zip,
                meta: serde_json::json!({}),
            },
        )
        .await
        .unwrap();

        let content = get_file(blob.as_ref(), &PlainTextParser, &skill, "notes.txt", 3600).await.unwrap();
        match content {
            SkillFileContent::Inline(text) => assert_eq!(text, "hello world"),
            SkillFileContent::PresignedUrl(_) => panic!("expected inline content"),
        }
    }

    #[test]
    fn scan_missing_skill_md_surfaces_core_error() {
        let zip = build_zip(&[("readme.txt", "nope")]);
        assert_eq!(scan(&zip).unwrap_err(), CoreError::SkillMissingSkillMd);
    }
}
