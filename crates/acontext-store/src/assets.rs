use anyhow::Result;
use rusqlite::params;
use tokio::task;

use crate::{lock_err, Store};

/// Asset-reference counter (§4.9): `(project_id, sha256) → count`,
/// incremented on successful upload, decremented on message deletion.
/// Realized as an atomic `INSERT ... ON CONFLICT DO UPDATE` upsert so
/// concurrent increments never race-lose an update.
pub struct AssetReferenceRepo {
    store: Store,
}

impl AssetReferenceRepo {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn increment(&self, project_id: &str, sha256: &str) -> Result<()> {
        self.bump(project_id, sha256, 1).await
    }

    pub async fn decrement(&self, project_id: &str, sha256: &str) -> Result<()> {
        self.bump(project_id, sha256, -1).await
    }

    async fn bump(&self, project_id: &str, sha256: &str, delta: i64) -> Result<()> {
        let db = self.store.db();
        let project_id = project_id.to_string();
        let sha256 = sha256.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            conn.execute(
                r#"
                INSERT INTO asset_references (project_id, sha256, count)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(project_id, sha256) DO UPDATE SET count = count + excluded.count
                "#,
                params![project_id, sha256, delta],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn count(&self, project_id: &str, sha256: &str) -> Result<i64> {
        let db = self.store.db();
        let project_id = project_id.to_string();
        let sha256 = sha256.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            conn.query_row(
                "SELECT count FROM asset_references WHERE project_id = ?1 AND sha256 = ?2",
                params![project_id, sha256],
                |row| row.get::<_, i64>(0),
            )
            .or(Ok(0))
        })
        .await?
    }
}
