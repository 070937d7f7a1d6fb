//! SQLite-backed realization of the relational store interface: an
//! `Arc<Mutex<Connection>>` shared handle with a `spawn_blocking` section
//! per repository call, and a versioned migration ladder.

mod assets;
mod gemini_queue;
mod messages;
mod migrations;
mod sessions;
mod skills;
mod spaces;
mod tasks;

pub use assets::AssetReferenceRepo;
pub use gemini_queue::GeminiCallQueueRepo;
pub use messages::{MessageRepo, MessageRow, NewMessage};
pub use sessions::SessionRepo;
pub use skills::SkillRepo;
pub use spaces::SpaceRepo;
pub use tasks::TaskRepo;

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use rusqlite::Connection;

/// Shared handle to the SQLite connection. Cheap to clone; every repository
/// method wraps its blocking section in `tokio::task::spawn_blocking`.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run_migrations(&conn)?;
        Ok(Self { db: Arc::new(Mutex::new(conn)) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run_migrations(&conn)?;
        Ok(Self { db: Arc::new(Mutex::new(conn)) })
    }

    pub fn db(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.db)
    }

    pub fn sessions(&self) -> SessionRepo {
        SessionRepo::new(self.clone())
    }

    pub fn messages(&self) -> MessageRepo {
        MessageRepo::new(self.clone())
    }

    pub fn assets(&self) -> AssetReferenceRepo {
        AssetReferenceRepo::new(self.clone())
    }

    pub fn skills(&self) -> SkillRepo {
        SkillRepo::new(self.clone())
    }

    pub fn spaces(&self) -> SpaceRepo {
        SpaceRepo::new(self.clone())
    }

    pub fn tasks(&self) -> TaskRepo {
        TaskRepo::new(self.clone())
    }

    pub fn gemini_call_queue(&self) -> GeminiCallQueueRepo {
        GeminiCallQueueRepo::new(self.clone())
    }
}

pub(crate) fn lock_err() -> anyhow::Error {
    anyhow!("failed to lock sqlite connection")
}
