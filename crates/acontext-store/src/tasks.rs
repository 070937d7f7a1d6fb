use acontext_schema::{Task, TaskStatus};
use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use tokio::task;

use crate::{lock_err, Store};

pub struct TaskRepo {
    store: Store,
}

impl TaskRepo {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn insert(&self, task_row: &Task) -> Result<()> {
        let db = self.store.db();
        let task_row = task_row.clone();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let data = serde_json::to_string(&task_row.data)?;
            conn.execute(
                r#"
                INSERT INTO tasks (id, session_id, project_id, "order", data, status, is_planning)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    task_row.id,
                    task_row.session_id,
                    task_row.project_id,
                    task_row.order,
                    data,
                    status_to_str(task_row.status),
                    task_row.is_planning as i64,
                ],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn get(&self, task_id: &str) -> Result<Option<Task>> {
        let db = self.store.db();
        let task_id = task_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            conn.query_row(
                r#"
                SELECT id, session_id, project_id, "order", data, status, is_planning
                FROM tasks WHERE id = ?1
                "#,
                params![task_id],
                row_to_task,
            )
            .optional()
            .map_err(anyhow::Error::from)
        })
        .await?
    }

    /// `UpdateStatus(project_id, session_id, task_id, status) → Task`.
    /// Returns `Ok(None)` for the not-found sentinel (distinguishable from
    /// infrastructure errors, which surface as `Err`), per §6.
    pub async fn update_status(
        &self,
        project_id: &str,
        session_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<Option<Task>> {
        let db = self.store.db();
        let project_id = project_id.to_string();
        let session_id = session_id.to_string();
        let task_id = task_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let updated = conn.execute(
                r#"
                UPDATE tasks SET status = ?1
                WHERE id = ?2 AND project_id = ?3 AND session_id = ?4
                "#,
                params![status_to_str(status), task_id, project_id, session_id],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            conn.query_row(
                r#"
                SELECT id, session_id, project_id, "order", data, status, is_planning
                FROM tasks WHERE id = ?1
                "#,
                params![task_id],
                row_to_task,
            )
            .optional()
            .map_err(anyhow::Error::from)
        })
        .await?
    }

    pub async fn list_by_session(&self, session_id: &str) -> Result<Vec<Task>> {
        let db = self.store.db();
        let session_id = session_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, session_id, project_id, "order", data, status, is_planning
                FROM tasks WHERE session_id = ?1 ORDER BY "order" ASC
                "#,
            )?;
            let rows = stmt.query_map(params![session_id], row_to_task)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok::<Vec<Task>, anyhow::Error>(out)
        })
        .await?
    }
}

fn status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Running => "running",
        TaskStatus::Success => "success",
        TaskStatus::Failed => "failed",
    }
}

fn str_to_status(raw: &str) -> TaskStatus {
    match raw {
        "running" => TaskStatus::Running,
        "success" => TaskStatus::Success,
        "failed" => TaskStatus::Failed,
        _ => TaskStatus::Pending,
    }
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let data_raw: String = row.get(4)?;
    let data = serde_json::from_str(&data_raw).unwrap_or(serde_json::Value::Null);
    let status_raw: String = row.get(5)?;
    let is_planning: i64 = row.get(6)?;
    Ok(Task {
        id: row.get(0)?,
        session_id: row.get(1)?,
        project_id: row.get(2)?,
        order: row.get(3)?,
        data,
        status: str_to_status(&status_raw),
        is_planning: is_planning != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    fn make_task(id: &str, session_id: &str) -> Task {
        Task {
            id: id.to_string(),
            session_id: session_id.to_string(),
            project_id: "p1".to_string(),
            order: 0,
            data: serde_json::json!({}),
            status: TaskStatus::Pending,
            is_planning: false,
        }
    }

    #[tokio::test]
    async fn update_status_returns_updated_task() {
        let store = Store::open_in_memory().unwrap();
        store.tasks().insert(&make_task("t1", "s1")).await.unwrap();
        let updated = store
            .tasks()
            .update_status("p1", "s1", "t1", TaskStatus::Success)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Success);
        assert!(updated.status.is_terminal());
    }

    #[tokio::test]
    async fn update_status_on_missing_task_is_none_not_error() {
        let store = Store::open_in_memory().unwrap();
        let result = store
            .tasks()
            .update_status("p1", "s1", "missing", TaskStatus::Failed)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
