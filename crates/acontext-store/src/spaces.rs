use acontext_schema::{
    CoreError, LearningSpace, LearningSpaceSession, LearningSpaceSkill, SessionLearnStatus,
};
use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use tokio::task;

use crate::{lock_err, Store};

pub struct SpaceRepo {
    store: Store,
}

impl SpaceRepo {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn insert(&self, space: &LearningSpace) -> Result<()> {
        let db = self.store.db();
        let space = space.clone();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let meta = serde_json::to_string(&space.meta)?;
            conn.execute(
                "INSERT INTO learning_spaces (id, project_id, user_id, meta) VALUES (?1, ?2, ?3, ?4)",
                params![space.id, space.project_id, space.user_id, meta],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn get(&self, space_id: &str) -> Result<Option<LearningSpace>> {
        let db = self.store.db();
        let space_id = space_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            conn.query_row(
                "SELECT id, project_id, user_id, meta FROM learning_spaces WHERE id = ?1",
                params![space_id],
                |row| {
                    let meta_raw: String = row.get(3)?;
                    let meta = serde_json::from_str(&meta_raw).unwrap_or(serde_json::Value::Null);
                    Ok(LearningSpace {
                        id: row.get(0)?,
                        project_id: row.get(1)?,
                        user_id: row.get(2)?,
                        meta,
                    })
                },
            )
            .optional()
            .map_err(anyhow::Error::from)
        })
        .await?
    }

    /// Inserts both junction rows for Learn(session, space): a session is
    /// globally unique across all spaces (`session_already_learned` on
    /// conflict).
    pub async fn learn_session(&self, space_id: &str, session_id: &str) -> Result<()> {
        let db = self.store.db();
        let space_id = space_id.to_string();
        let session_id = session_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let result = conn.execute(
                r#"
                INSERT INTO learning_space_sessions (space_id, session_id, status)
                VALUES (?1, ?2, ?3)
                "#,
                params![space_id, session_id, status_to_str(SessionLearnStatus::Pending)],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(anyhow::Error::new(CoreError::SessionAlreadyLearned))
                }
                Err(err) => Err(anyhow::Error::from(err)),
            }
        })
        .await??;
        Ok(())
    }

    pub async fn update_session_status(
        &self,
        space_id: &str,
        session_id: &str,
        status: SessionLearnStatus,
    ) -> Result<()> {
        let db = self.store.db();
        let space_id = space_id.to_string();
        let session_id = session_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            conn.execute(
                "UPDATE learning_space_sessions SET status = ?1 WHERE space_id = ?2 AND session_id = ?3",
                params![status_to_str(status), space_id, session_id],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    /// Deletes the space row and both of its junction tables. Used by the
    /// bootstrap rollback path when skill creation fails partway through.
    pub async fn delete(&self, space_id: &str) -> Result<()> {
        let db = self.store.db();
        let space_id = space_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            conn.execute("DELETE FROM learning_space_skills WHERE space_id = ?1", params![space_id])?;
            conn.execute("DELETE FROM learning_space_sessions WHERE space_id = ?1", params![space_id])?;
            conn.execute("DELETE FROM learning_spaces WHERE id = ?1", params![space_id])?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    /// Used by the task-terminal hand-off: does any learning space
    /// reference this session?
    pub async fn exists_by_session_id(&self, session_id: &str) -> Result<bool> {
        let db = self.store.db();
        let session_id = session_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM learning_space_sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            Ok::<bool, anyhow::Error>(count > 0)
        })
        .await?
    }

    pub async fn list_sessions(&self, space_id: &str) -> Result<Vec<LearningSpaceSession>> {
        let db = self.store.db();
        let space_id = space_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let mut stmt = conn.prepare(
                "SELECT space_id, session_id, status FROM learning_space_sessions WHERE space_id = ?1",
            )?;
            let rows = stmt.query_map(params![space_id], |row| {
                let status_raw: String = row.get(2)?;
                Ok(LearningSpaceSession {
                    space_id: row.get(0)?,
                    session_id: row.get(1)?,
                    status: str_to_status(&status_raw),
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok::<Vec<LearningSpaceSession>, anyhow::Error>(out)
        })
        .await?
    }

    /// IncludeSkill: insert the junction row. Unique on both
    /// `(space, skill_id)` and `(space, skill_name)`.
    pub async fn include_skill(&self, space_id: &str, skill_id: &str, skill_name: &str) -> Result<()> {
        let db = self.store.db();
        let space_id = space_id.to_string();
        let skill_id = skill_id.to_string();
        let skill_name = skill_name.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            conn.execute(
                r#"
                INSERT OR IGNORE INTO learning_space_skills (space_id, skill_id, skill_name)
                VALUES (?1, ?2, ?3)
                "#,
                params![space_id, skill_id, skill_name],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    /// ExcludeSkill: idempotent delete by `(space, skill)`.
    pub async fn exclude_skill(&self, space_id: &str, skill_id: &str) -> Result<()> {
        let db = self.store.db();
        let space_id = space_id.to_string();
        let skill_id = skill_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            conn.execute(
                "DELETE FROM learning_space_skills WHERE space_id = ?1 AND skill_id = ?2",
                params![space_id, skill_id],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn list_skills(&self, space_id: &str) -> Result<Vec<LearningSpaceSkill>> {
        let db = self.store.db();
        let space_id = space_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let mut stmt = conn.prepare(
                "SELECT space_id, skill_id, skill_name FROM learning_space_skills WHERE space_id = ?1",
            )?;
            let rows = stmt.query_map(params![space_id], |row| {
                Ok(LearningSpaceSkill {
                    space_id: row.get(0)?,
                    skill_id: row.get(1)?,
                    skill_name: row.get(2)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok::<Vec<LearningSpaceSkill>, anyhow::Error>(out)
        })
        .await?
    }
}

fn status_to_str(status: SessionLearnStatus) -> &'static str {
    match status {
        SessionLearnStatus::Pending => "pending",
        SessionLearnStatus::Success => "success",
        SessionLearnStatus::Failed => "failed",
    }
}

fn str_to_status(raw: &str) -> SessionLearnStatus {
    match raw {
        "success" => SessionLearnStatus::Success,
        "failed" => SessionLearnStatus::Failed,
        _ => SessionLearnStatus::Pending,
    }
}
