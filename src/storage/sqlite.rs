//! `SQLite` backend: one row per collection in a key/value table.

use std::path::PathBuf;

use jiff::Timestamp;
use rusqlite::{Connection, OptionalExtension};

use crate::model::Collection;

use super::{Backend, Result};

/// The primary store. Opened per operation, so a broken database file only
/// fails the call that touches it.
pub struct SqliteBackend {
    path: PathBuf,
}

impl SqliteBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS collections (
                key        TEXT PRIMARY KEY,
                body       TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )?;
        Ok(conn)
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn write(&self, collection: Collection, body: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO collections (key, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            rusqlite::params![collection.key(), body, Timestamp::now().to_string()],
        )?;
        Ok(())
    }

    fn read(&self, collection: Collection) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let conn = self.connect()?;
        let body = conn
            .query_row(
                "SELECT body FROM collections WHERE key = ?1",
                [collection.key()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(body)
    }
}
