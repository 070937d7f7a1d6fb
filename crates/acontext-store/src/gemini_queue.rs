use acontext_schema::GeminiCallInfo;
use anyhow::Result;
use rusqlite::params;
use tokio::task;

use crate::{lock_err, Store};

/// Per-session FIFO of `{id, name}` Gemini tool-call records awaiting their
/// tool-result (§4.2). Persisted directly in `gemini_call_queue` per the
/// Open Question decision: pop is a single indexed `SELECT` + `UPDATE`
/// inside one `BEGIN IMMEDIATE` transaction, which SQLite serializes
/// against any other writer on the same file.
pub struct GeminiCallQueueRepo {
    store: Store,
}

impl GeminiCallQueueRepo {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// Appends call-info entries in order. Called in the same logical write
    /// as the assistant message insert that emitted them.
    pub async fn push(&self, session_id: &str, entries: &[GeminiCallInfo]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let db = self.store.db();
        let session_id = session_id.to_string();
        let entries = entries.to_vec();
        task::spawn_blocking(move || {
            let mut conn = db.lock().map_err(|_| lock_err())?;
            let tx = conn.transaction()?;
            let next_seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), -1) + 1 FROM gemini_call_queue WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            for (offset, entry) in entries.iter().enumerate() {
                tx.execute(
                    r#"
                    INSERT INTO gemini_call_queue (session_id, seq, call_id, name, consumed)
                    VALUES (?1, ?2, ?3, ?4, 0)
                    "#,
                    params![session_id, next_seq + offset as i64, entry.id, entry.name],
                )?;
            }
            tx.commit()?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    /// Pops the head of the queue, marking it consumed. Returns `None` if
    /// the queue is empty (caller maps this to `no_available_call_info`).
    pub async fn pop(&self, session_id: &str) -> Result<Option<(String, String)>> {
        let db = self.store.db();
        let session_id = session_id.to_string();
        task::spawn_blocking(move || {
            let mut conn = db.lock().map_err(|_| lock_err())?;
            let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
            let head: Option<(i64, String, String)> = tx
                .query_row(
                    r#"
                    SELECT seq, call_id, name FROM gemini_call_queue
                    WHERE session_id = ?1 AND consumed = 0
                    ORDER BY seq ASC LIMIT 1
                    "#,
                    params![session_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .ok();

            let result = if let Some((seq, call_id, name)) = head {
                tx.execute(
                    "UPDATE gemini_call_queue SET consumed = 1 WHERE session_id = ?1 AND seq = ?2",
                    params![session_id, seq],
                )?;
                Some((call_id, name))
            } else {
                None
            };
            tx.commit()?;
            Ok::<Option<(String, String)>, anyhow::Error>(result)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let store = Store::open_in_memory().unwrap();
        let repo = store.gemini_call_queue();
        repo.push(
            "s1",
            &[
                GeminiCallInfo { id: "c1".into(), name: "lookup".into() },
                GeminiCallInfo { id: "c2".into(), name: "search".into() },
            ],
        )
        .await
        .unwrap();

        let first = repo.pop("s1").await.unwrap().unwrap();
        assert_eq!(first, ("c1".to_string(), "lookup".to_string()));
        let second = repo.pop("s1").await.unwrap().unwrap();
        assert_eq!(second, ("c2".to_string(), "search".to_string()));
    }

    #[tokio::test]
    async fn pop_on_empty_queue_is_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.gemini_call_queue().pop("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pushes_append_rather_than_overwrite_sequence() {
        let store = Store::open_in_memory().unwrap();
        let repo = store.gemini_call_queue();
        repo.push("s1", &[GeminiCallInfo { id: "c1".into(), name: "a".into() }])
            .await
            .unwrap();
        repo.push("s1", &[GeminiCallInfo { id: "c2".into(), name: "b".into() }])
            .await
            .unwrap();

        assert_eq!(repo.pop("s1").await.unwrap().unwrap().0, "c1");
        assert_eq!(repo.pop("s1").await.unwrap().unwrap().0, "c2");
    }
}
