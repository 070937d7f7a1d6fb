use acontext_schema::Session;
use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use tokio::task;

use crate::{lock_err, Store};

pub struct SessionRepo {
    store: Store,
}

impl SessionRepo {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn insert(&self, session: &Session) -> Result<()> {
        let db = self.store.db();
        let session = session.clone();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let configs = serde_json::to_string(&session.configs)?;
            conn.execute(
                r#"
                INSERT INTO sessions (id, project_id, user_id, configs, disable_task_tracking, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    session.id,
                    session.project_id,
                    session.user_id,
                    configs,
                    session.disable_task_tracking as i64,
                    session.created_at.to_rfc3339(),
                ],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let db = self.store.db();
        let session_id = session_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            conn.query_row(
                r#"
                SELECT id, project_id, user_id, configs, disable_task_tracking, created_at
                FROM sessions WHERE id = ?1
                "#,
                params![session_id],
                row_to_session,
            )
            .optional()
            .map_err(anyhow::Error::from)
        })
        .await?
    }

    /// Used by the learning-space service to test whether a session is
    /// already referenced by any junction row.
    pub async fn exists(&self, session_id: &str) -> Result<bool> {
        Ok(self.get(session_id).await?.is_some())
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    let configs_raw: String = row.get(3)?;
    let configs = serde_json::from_str(&configs_raw).unwrap_or(serde_json::Value::Null);
    let disable_task_tracking: i64 = row.get(4)?;
    let created_at_raw: String = row.get(5)?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());
    Ok(Session {
        id: row.get(0)?,
        project_id: row.get(1)?,
        user_id: row.get(2)?,
        configs,
        disable_task_tracking: disable_task_tracking != 0,
        created_at,
    })
}
