//! Phase 2 of skill ingest: materialize (bounded-concurrency upload) and
//! rollback. Bounded concurrency is a `buffer_unordered` pool over the blob
//! store borrow (the `BlobStore` trait object's lifetime rules out
//! `tokio::spawn`'s `'static` bound, so the pool runs in-task rather than
//! across spawned tasks); dropping the stream on the first failure cancels
//! every still-in-flight upload future in place, giving cancel-on-first-error
//! semantics without a separate cancellation token. Rollback itself does
//! need to survive caller cancellation, so it runs on a detached
//! `tokio::spawn`ed task over owned (`Arc`/`Clone`) handles rather than
//! borrowed ones.

use std::sync::Arc;

use acontext_blob::BlobStore;
use acontext_schema::{sanitize_skill_name, AgentSkill, SkillAssetMeta, SkillFileEntry};
use acontext_store::Store;
use anyhow::{anyhow, Result};
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use uuid::Uuid;

use crate::scan::{self, ScanResult, ScannedEntry};

const MAX_CONCURRENT_UPLOADS: usize = 10;

pub struct IngestSkillRequest {
    pub project_id: String,
    pub user_id: Option<String>,
    pub zip_bytes: Vec<u8>,
    pub meta: Value,
}

/// Full ingest: scan, DB row insert, parallel file materialize, and
/// rollback on any post-insert failure.
pub async fn ingest_skill(store: &Store, blob: Arc<dyn BlobStore>, req: IngestSkillRequest) -> Result<AgentSkill> {
    let scanned = scan::scan(&req.zip_bytes)?;
    create_from_scanned(store, blob, &req.project_id, req.user_id, scanned, req.meta).await
}

/// Shared tail of skill creation once a `ScanResult` is in hand, regardless
/// of whether it came from an uploaded ZIP (`ingest_skill`) or an embedded
/// template directory (the learning-space bootstrap's `CreateFromTemplate`).
pub async fn create_from_scanned(
    store: &Store,
    blob: Arc<dyn BlobStore>,
    project_id: &str,
    user_id: Option<String>,
    scanned: ScanResult,
    meta: Value,
) -> Result<AgentSkill> {
    let skill_id = Uuid::new_v4().to_string();
    let sanitized_name = sanitize_skill_name(&scanned.frontmatter.name);

    let skill = AgentSkill {
        id: skill_id.clone(),
        project_id: project_id.to_string(),
        user_id,
        name: sanitized_name.clone(),
        description: scanned.frontmatter.description.clone(),
        meta,
        asset_meta: None,
        file_index: Vec::new(),
    };
    // Step 6: no rollback needed for this failure — nothing has been
    // created yet beyond the (rejected) row itself.
    store.skills().insert(&skill).await?;

    let base_key = format!("agent_skills/{project_id}/{skill_id}/{sanitized_name}");

    match materialize(blob.as_ref(), &base_key, &scanned.entries).await {
        Ok((bucket, file_index)) => {
            let asset_meta = SkillAssetMeta { bucket, key: base_key };
            store
                .skills()
                .update_asset_meta(&skill_id, asset_meta.clone(), file_index.clone())
                .await?;
            Ok(AgentSkill { asset_meta: Some(asset_meta), file_index, ..skill })
        }
        Err(upload_err) => {
            let cleanup_err = rollback(blob, store.clone(), base_key, skill_id).await.err();
            match cleanup_err {
                Some(cleanup_err) => Err(anyhow!("{upload_err}; cleanup also failed: {cleanup_err}")),
                None => Err(upload_err),
            }
        }
    }
}

/// Uploads every scanned file under `base_key`, bounded to
/// `MAX_CONCURRENT_UPLOADS` concurrent uploads. On the first failure this
/// returns immediately; dropping the `buffer_unordered` stream drops every
/// upload future still queued or in flight, so nothing past the failure
/// point reaches the blob store.
async fn materialize(
    blob: &dyn BlobStore,
    base_key: &str,
    entries: &[ScannedEntry],
) -> Result<(String, Vec<SkillFileEntry>)> {
    let uploads = stream::iter(entries.iter().enumerate().map(|(index, entry)| async move {
        let key = format!("{base_key}/{}", entry.relative_path);
        let asset = blob.upload_bytes(&key, entry.bytes.clone(), &entry.mime).await?;
        Ok::<_, anyhow::Error>((index, asset.bucket, SkillFileEntry {
            path: entry.relative_path.clone(),
            mime: entry.mime.clone(),
        }))
    }))
    .buffer_unordered(MAX_CONCURRENT_UPLOADS);
    tokio::pin!(uploads);

    let mut ordered: Vec<Option<(String, SkillFileEntry)>> = vec![None; entries.len()];
    while let Some(result) = uploads.next().await {
        match result {
            Ok((index, bucket, file_entry)) => ordered[index] = Some((bucket, file_entry)),
            Err(err) => return Err(err),
        }
    }

    let bucket = ordered
        .iter()
        .find_map(|entry| entry.as_ref().map(|(bucket, _)| bucket.clone()))
        .ok_or_else(|| anyhow!("no files uploaded"))?;
    let file_index = ordered
        .into_iter()
        .map(|entry| entry.expect("all entries resolved when no error present").1)
        .collect();

    Ok((bucket, file_index))
}

/// Deletes every blob under `base_key` and the skill row, on a detached
/// task so caller cancellation can't abort cleanup partway through. Both
/// the upload error and any cleanup error are reported together by the
/// caller.
async fn rollback(blob: Arc<dyn BlobStore>, store: Store, base_key: String, skill_id: String) -> Result<()> {
    let task = tokio::spawn(async move {
        let blob_delete = blob.delete_by_prefix(&base_key).await;
        let row_delete = store.skills().delete(&skill_id).await;
        match (blob_delete, row_delete) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(b), Ok(())) => Err(b),
            (Ok(()), Err(r)) => Err(r),
            (Err(b), Err(r)) => Err(anyhow!("{b}; {r}")),
        }
    });
    task.await.unwrap_or_else(|join_err| Err(anyhow!("cleanup task panicked: {join_err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use acontext_blob::FsBlobStore;
    use std::io::{Cursor, Write};
    use std::sync::Arc;
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

    #[tokio::test]
    async fn ingest_materializes_files_and_updates_row() {
        let dir = TempDir::new().unwrap();
        let blob: Arc<dyn acontext_blob::BlobStore> = Arc::new(FsBlobStore::new(dir.path()));
        let store = Store::open_in_memory().unwrap();

        let zip = build_zip(&[
            ("pdf-reader/SKILL.md", "---\nname: pdf reader\ndescription: reads pdfs\n---\nbody"),
            ("pdf-reader/script.py", "print('hi')"),
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

        assert_eq!(skill.name, "pdf-reader");
        assert!(skill.asset_meta.is_some());
        assert_eq!(skill.file_index.len(), 2);

        let stored = store.skills().get(&skill.id).await.unwrap().unwrap();
        assert_eq!(stored.file_index.len(), 2);
    }

    #[tokio::test]
    async fn ingest_rejects_archive_without_skill_md() {
        let dir = TempDir::new().unwrap();
        let blob: Arc<dyn acontext_blob::BlobStore> = Arc::new(FsBlobStore::new(dir.path()));
        let store = Store::open_in_memory().unwrap();

        let zip = build_zip(&[("readme.txt", "nothing here")]);
        let err = ingest_skill(
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
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<acontext_schema::CoreError>(),
            Some(&acontext_schema::CoreError::SkillMissingSkillMd)
        );
    }

    #[tokio::test]
    async fn duplicate_skill_name_fails_without_partial_row() {
        let dir = TempDir::new().unwrap();
        let blob: Arc<dyn acontext_blob::BlobStore> = Arc::new(FsBlobStore::new(dir.path()));
        let store = Store::open_in_memory().unwrap();

        let zip = || {
            build_zip(&[("SKILL.md", "---\nname: dup\ndescription: d\n---\n"), ("a.txt", "a")])
        };

        ingest_skill(
            &store,
            blob.clone(),
            IngestSkillRequest { project_id: "p1".to_string(), user_id: None, zip_bytes: zip(), meta: serde_json::json!({}) },
        )
        .await
        .unwrap();

        let err = ingest_skill(
            &store,
            blob.clone(),
            IngestSkillRequest { project_id: "p1".to_string(), user_id: None, zip_bytes: zip(), meta: serde_json::json!({}) },
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<acontext_schema::CoreError>(),
            Some(&acontext_schema::CoreError::SkillAlreadyExists)
        );
    }
}
