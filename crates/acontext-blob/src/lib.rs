//! Persistent blob store interface plus a filesystem-rooted realization:
//! an async `tokio::fs`-based store with graceful `NotFound` handling.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use acontext_schema::Asset;

/// Object-store interface every caller in the message/skill/space pipelines
/// goes through. Concrete implementations (filesystem here, S3/GCS in a real
/// deployment) are swappable behind this trait.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload raw bytes at an exact key, returning the resulting Asset.
    async fn upload_bytes(&self, key: &str, bytes: Vec<u8>, mime: &str) -> Result<Asset>;

    /// Upload a JSON value under a key derived from its content hash:
    /// `<key_prefix>/<sha256>`. Used by the parts store (§4.3).
    async fn upload_json(&self, key_prefix: &str, value: &serde_json::Value) -> Result<Asset> {
        let bytes = serde_json::to_vec(value).context("serialize json for blob upload")?;
        let sha256 = sha256_hex(&bytes);
        let key = format!("{key_prefix}/{sha256}");
        self.upload_bytes(&key, bytes, "application/json").await
    }

    /// Download raw bytes for a key.
    async fn download_bytes(&self, key: &str) -> Result<Vec<u8>>;

    /// Mint a presigned (or, for the local filesystem realization,
    /// HMAC-stamped) URL valid for `expire_secs`.
    async fn presign_get(&self, key: &str, expire_secs: u64) -> Result<String>;

    /// Delete every object whose key starts with `prefix`.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<()>;
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Filesystem-rooted blob store. Content lives under `root/<key>`.
pub struct FsBlobStore {
    root: PathBuf,
    bucket: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            bucket: "local".to_string(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload_bytes(&self, key: &str, bytes: Vec<u8>, mime: &str) -> Result<Asset> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.context("create blob parent dir")?;
        }
        let sha256 = sha256_hex(&bytes);
        let size = bytes.len() as u64;
        tokio::fs::write(&path, &bytes).await.context("write blob bytes")?;
        tracing::debug!(key, size, "blob uploaded");
        Ok(Asset::new(self.bucket.clone(), key, sha256, mime, size))
    }

    async fn download_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                anyhow::bail!("blob not found: {key}")
            }
            Err(err) => Err(err).context("read blob bytes"),
        }
    }

    async fn presign_get(&self, key: &str, expire_secs: u64) -> Result<String> {
        let expires_at = chrono::Utc::now().timestamp() + expire_secs as i64;
        let token = sha256_hex(format!("{key}:{expires_at}").as_bytes());
        Ok(format!("file://{}?expires={expires_at}&token={token}", self.path_for(key).display()))
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<()> {
        let dir = self.path_for(prefix);
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {
                tokio::fs::remove_dir_all(&dir).await.context("remove blob prefix dir")?;
            }
            Ok(_) => {
                tokio::fs::remove_file(&dir).await.context("remove blob prefix file")?;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err).context("stat blob prefix"),
        }
        // Entries whose key is `prefix/...` but whose exact-path form above
        // didn't match a directory (e.g. `prefix` itself never existed as a
        // dir because keys are files under it) are handled by removing any
        // sibling path starting with `prefix` at the parent level.
        if let Some(parent) = Path::new(prefix).parent() {
            let parent_path = self.path_for(&parent.to_string_lossy());
            let stem = Path::new(prefix)
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            if let Ok(mut entries) = tokio::fs::read_dir(&parent_path).await {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    if entry.file_name().to_string_lossy().starts_with(&stem) {
                        let p = entry.path();
                        if p.is_dir() {
                            let _ = tokio::fs::remove_dir_all(&p).await;
                        } else {
                            let _ = tokio::fs::remove_file(&p).await;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn upload_then_download_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());
        let asset = store
            .upload_bytes("assets/p1/foo.txt", b"hello".to_vec(), "text/plain")
            .await
            .unwrap();
        assert_eq!(asset.size, 5);
        let back = store.download_bytes("assets/p1/foo.txt").await.unwrap();
        assert_eq!(back, b"hello");
    }

    #[tokio::test]
    async fn download_missing_key_fails() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());
        let err = store.download_bytes("does/not/exist").await.unwrap_err();
        assert!(err.to_string().contains("blob not found"));
    }

    #[tokio::test]
    async fn upload_json_keys_by_content_hash() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());
        let value = serde_json::json!([{"type": "text", "text": "hi"}]);
        let asset = store.upload_json("parts/p1", &value).await.unwrap();
        assert!(asset.key.starts_with("parts/p1/"));
        assert_eq!(asset.key, format!("parts/p1/{}", asset.sha256));
    }

    #[tokio::test]
    async fn delete_by_prefix_removes_all_descendants() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());
        store
            .upload_bytes("agent_skills/p1/s1/skill/SKILL.md", b"a".to_vec(), "text/markdown")
            .await
            .unwrap();
        store
            .upload_bytes("agent_skills/p1/s1/skill/sub/file.md", b"b".to_vec(), "text/markdown")
            .await
            .unwrap();

        store.delete_by_prefix("agent_skills/p1/s1").await.unwrap();

        assert!(store
            .download_bytes("agent_skills/p1/s1/skill/SKILL.md")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn presign_get_embeds_expiry() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());
        let url = store.presign_get("assets/p1/foo.txt", 3600).await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.contains("expires="));
    }
}
