//! Version-tracked DDL ladder: an `__schema_version` table gating each
//! migration step.

use std::collections::HashSet;

use anyhow::Result;
use rusqlite::Connection;

type Migration = (i64, &'static str);

fn migrations() -> Vec<Migration> {
    vec![
        (
            1,
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                user_id TEXT,
                configs TEXT NOT NULL,
                disable_task_tracking INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_id);
            "#,
        ),
        (
            2,
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES sessions(id),
                project_id TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL,
                meta TEXT NOT NULL,
                parts_bucket TEXT NOT NULL,
                parts_key TEXT NOT NULL,
                parts_sha256 TEXT NOT NULL,
                parts_etag TEXT,
                parts_mime TEXT NOT NULL,
                parts_size INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_session_created
                ON messages(session_id, created_at, id);
            "#,
        ),
        (
            3,
            r#"
            CREATE TABLE IF NOT EXISTS asset_references (
                project_id TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (project_id, sha256)
            );
            "#,
        ),
        (
            4,
            r#"
            CREATE TABLE IF NOT EXISTS agent_skills (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                user_id TEXT,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                meta TEXT NOT NULL,
                asset_bucket TEXT,
                asset_key TEXT,
                file_index TEXT NOT NULL DEFAULT '[]'
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_agent_skills_project_name
                ON agent_skills(project_id, name);
            "#,
        ),
        (
            5,
            r#"
            CREATE TABLE IF NOT EXISTS learning_spaces (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                user_id TEXT,
                meta TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS learning_space_skills (
                space_id TEXT NOT NULL,
                skill_id TEXT NOT NULL,
                skill_name TEXT NOT NULL,
                PRIMARY KEY (space_id, skill_id)
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_learning_space_skills_name
                ON learning_space_skills(space_id, skill_name);

            CREATE TABLE IF NOT EXISTS learning_space_sessions (
                space_id TEXT NOT NULL,
                session_id TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL,
                PRIMARY KEY (space_id, session_id)
            );
            "#,
        ),
        (
            6,
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                "order" INTEGER NOT NULL,
                data TEXT NOT NULL,
                status TEXT NOT NULL,
                is_planning INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_session_order ON tasks(session_id, "order");
            "#,
        ),
        (
            7,
            r#"
            CREATE TABLE IF NOT EXISTS gemini_call_queue (
                session_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                call_id TEXT NOT NULL,
                name TEXT NOT NULL,
                consumed INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (session_id, seq)
            );

            CREATE INDEX IF NOT EXISTS idx_gemini_call_queue_pending
                ON gemini_call_queue(session_id, consumed, seq);
            "#,
        ),
    ]
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS __schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    let mut stmt = conn.prepare("SELECT version FROM __schema_version")?;
    let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
    let mut applied = HashSet::new();
    for row in rows {
        applied.insert(row?);
    }
    drop(stmt);

    for (version, sql) in migrations() {
        if applied.contains(&version) {
            continue;
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO __schema_version(version, applied_at) VALUES (?1, datetime('now'))",
            [version],
        )?;
        tx.commit()?;
        tracing::info!(version, "applied schema migration");
    }

    Ok(())
}
