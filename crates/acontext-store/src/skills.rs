use acontext_schema::{AgentSkill, CoreError, SkillAssetMeta, SkillFileEntry};
use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use tokio::task;

use crate::{lock_err, Store};

pub struct SkillRepo {
    store: Store,
}

impl SkillRepo {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// Inserts a skill row. `(project_id, name)` is unique; a duplicate
    /// name surfaces as `skill_already_exists`, not an opaque SQLite
    /// constraint error.
    pub async fn insert(&self, skill: &AgentSkill) -> Result<()> {
        let db = self.store.db();
        let skill = skill.clone();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let meta = serde_json::to_string(&skill.meta)?;
            let file_index = serde_json::to_string(&skill.file_index)?;
            let result = conn.execute(
                r#"
                INSERT INTO agent_skills (
                    id, project_id, user_id, name, description, meta,
                    asset_bucket, asset_key, file_index
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    skill.id,
                    skill.project_id,
                    skill.user_id,
                    skill.name,
                    skill.description,
                    meta,
                    skill.asset_meta.as_ref().map(|a| a.bucket.clone()),
                    skill.asset_meta.as_ref().map(|a| a.key.clone()),
                    file_index,
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(anyhow::Error::new(CoreError::SkillAlreadyExists))
                }
                Err(err) => Err(anyhow::Error::from(err)),
            }
        })
        .await??;
        Ok(())
    }

    pub async fn get(&self, skill_id: &str) -> Result<Option<AgentSkill>> {
        let db = self.store.db();
        let skill_id = skill_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            conn.query_row(
                r#"
                SELECT id, project_id, user_id, name, description, meta,
                       asset_bucket, asset_key, file_index
                FROM agent_skills WHERE id = ?1
                "#,
                params![skill_id],
                row_to_skill,
            )
            .optional()
            .map_err(anyhow::Error::from)
        })
        .await?
    }

    pub async fn get_by_name(&self, project_id: &str, name: &str) -> Result<Option<AgentSkill>> {
        let db = self.store.db();
        let project_id = project_id.to_string();
        let name = name.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            conn.query_row(
                r#"
                SELECT id, project_id, user_id, name, description, meta,
                       asset_bucket, asset_key, file_index
                FROM agent_skills WHERE project_id = ?1 AND name = ?2
                "#,
                params![project_id, name],
                row_to_skill,
            )
            .optional()
            .map_err(anyhow::Error::from)
        })
        .await?
    }

    /// Step 9 of skill ingest: attaches `AssetMeta`/`FileIndex` once all
    /// files have materialized successfully.
    pub async fn update_asset_meta(
        &self,
        skill_id: &str,
        asset_meta: SkillAssetMeta,
        file_index: Vec<SkillFileEntry>,
    ) -> Result<()> {
        let db = self.store.db();
        let skill_id = skill_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let file_index_json = serde_json::to_string(&file_index)?;
            conn.execute(
                "UPDATE agent_skills SET asset_bucket = ?1, asset_key = ?2, file_index = ?3 WHERE id = ?4",
                params![asset_meta.bucket, asset_meta.key, file_index_json, skill_id],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn delete(&self, skill_id: &str) -> Result<()> {
        let db = self.store.db();
        let skill_id = skill_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            conn.execute("DELETE FROM agent_skills WHERE id = ?1", params![skill_id])?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn list_by_project(&self, project_id: &str) -> Result<Vec<AgentSkill>> {
        let db = self.store.db();
        let project_id = project_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, project_id, user_id, name, description, meta,
                       asset_bucket, asset_key, file_index
                FROM agent_skills WHERE project_id = ?1 ORDER BY name ASC
                "#,
            )?;
            let rows = stmt.query_map(params![project_id], row_to_skill)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok::<Vec<AgentSkill>, anyhow::Error>(out)
        })
        .await?
    }
}

fn row_to_skill(row: &rusqlite::Row) -> rusqlite::Result<AgentSkill> {
    let meta_raw: String = row.get(5)?;
    let meta = serde_json::from_str(&meta_raw).unwrap_or(serde_json::Value::Null);
    let file_index_raw: String = row.get(8)?;
    let file_index: Vec<SkillFileEntry> = serde_json::from_str(&file_index_raw).unwrap_or_default();
    let asset_bucket: Option<String> = row.get(6)?;
    let asset_key: Option<String> = row.get(7)?;
    let asset_meta = match (asset_bucket, asset_key) {
        (Some(bucket), Some(key)) => Some(acontext_schema::SkillAssetMeta { bucket, key }),
        _ => None,
    };
    Ok(AgentSkill {
        id: row.get(0)?,
        project_id: row.get(1)?,
        user_id: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        meta,
        asset_meta,
        file_index,
    })
}
