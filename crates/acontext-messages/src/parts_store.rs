//! Blob-backed parts store with a best-effort in-process cache: a
//! content-addressed blob convention (`parts/<project_id>/<sha256>`) fronted
//! by an in-process, LRU-free TTL cache (`HashMap` behind a `Mutex`, swept
//! lazily on access).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use acontext_blob::BlobStore;
use acontext_schema::{Asset, Part};
use anyhow::Result;

const CACHE_TTL: Duration = Duration::from_secs(3600);

struct CacheEntry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// `parts:<sha256>` keyed cache. Cache failures are logged and swallowed;
/// callers always fall back to the blob store.
pub struct PartsCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for PartsCache {
    fn default() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }
}

impl PartsCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, sha256: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(sha256) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.bytes.clone()),
            Some(_) => {
                entries.remove(sha256);
                None
            }
            None => None,
        }
    }

    fn set(&self, sha256: &str, bytes: Vec<u8>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(sha256.to_string(), CacheEntry { bytes, expires_at: Instant::now() + CACHE_TTL });
        }
    }
}

pub struct PartsStore<'a> {
    blob: &'a dyn BlobStore,
    cache: &'a PartsCache,
}

impl<'a> PartsStore<'a> {
    pub fn new(blob: &'a dyn BlobStore, cache: &'a PartsCache) -> Self {
        Self { blob, cache }
    }

    /// Serializes, uploads under `parts/<project_id>/<sha256>`, and
    /// best-effort populates the cache.
    pub async fn write(&self, project_id: &str, parts: &[Part]) -> Result<Asset> {
        let value = serde_json::to_value(parts)?;
        let bytes = serde_json::to_vec(&value)?;
        let key_prefix = format!("parts/{project_id}");
        let asset = self.blob.upload_json(&key_prefix, &value).await?;
        self.cache.set(&asset.sha256, bytes);
        Ok(asset)
    }

    /// Reads by sha256: cache hit short-circuits the blob; a miss
    /// downloads and re-populates the cache. `None` signals the blob
    /// couldn't be fetched or decoded — a genuinely empty parts array
    /// still comes back as `Some(vec![])`, so callers can tell "no parts"
    /// apart from "couldn't resolve parts" and skip the latter.
    pub async fn read(&self, asset: &Asset) -> Option<Vec<Part>> {
        if let Some(bytes) = self.cache.get(&asset.sha256) {
            if let Ok(parts) = serde_json::from_slice(&bytes) {
                return Some(parts);
            }
        }

        match self.blob.download_bytes(&asset.key).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(parts) => {
                    self.cache.set(&asset.sha256, bytes);
                    Some(parts)
                }
                Err(err) => {
                    tracing::warn!(key = asset.key, error = %err, "parts blob decode failed, skipping message");
                    None
                }
            },
            Err(err) => {
                tracing::warn!(key = asset.key, error = %err, "parts blob download failed, skipping message");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acontext_blob::FsBlobStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let blob = FsBlobStore::new(dir.path());
        let cache = PartsCache::new();
        let store = PartsStore::new(&blob, &cache);

        let parts = vec![Part::text("hello")];
        let asset = store.write("p1", &parts).await.unwrap();
        let back = store.read(&asset).await.unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].text.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn read_falls_back_to_blob_on_cache_miss() {
        let dir = TempDir::new().unwrap();
        let blob = FsBlobStore::new(dir.path());
        let write_cache = PartsCache::new();
        let asset = PartsStore::new(&blob, &write_cache)
            .write("p1", &[Part::text("hi")])
            .await
            .unwrap();

        let read_cache = PartsCache::new();
        let reader = PartsStore::new(&blob, &read_cache);
        let back = reader.read(&asset).await.unwrap();
        assert_eq!(back.len(), 1);
    }

    #[tokio::test]
    async fn read_of_missing_blob_yields_none() {
        let dir = TempDir::new().unwrap();
        let blob = FsBlobStore::new(dir.path());
        let cache = PartsCache::new();
        let reader = PartsStore::new(&blob, &cache);
        let asset = Asset::new("local", "parts/p1/does-not-exist", "deadbeef", "application/json", 0);
        let back = reader.read(&asset).await;
        assert!(back.is_none());
    }
}
