//! SQLite checkpoint store.
//!
//! Keeps the same JSON document as [`JsonFileStore`](super::JsonFileStore)
//! in a key/value table, so one database can hold the checkpoints of
//! several scan roots. Every write replaces the row inside a transaction.

use super::CheckpointStore;
use crate::error::CheckpointError;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// SQLite-backed checkpoint store
///
/// Uses WAL (Write-Ahead Logging) mode so a reader never observes a
/// half-applied replacement.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    key: String,
}

impl SqliteStore {
    /// Open or create the database at `path`, storing under `key`
    pub fn open(path: &Path, key: impl Into<String>) -> Result<Self, CheckpointError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Write {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| CheckpointError::Store(e.to_string()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| CheckpointError::Store(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                key TEXT PRIMARY KEY,
                document BLOB NOT NULL,
                saved_at INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| CheckpointError::Store(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
            key: key.into(),
        })
    }

    /// Open a store keyed by a scan root
    pub fn for_root(path: &Path, root: &Path) -> Result<Self, CheckpointError> {
        Self::open(path, root.to_string_lossy())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CheckpointError> {
        self.conn.lock().map_err(|_| CheckpointError::Corrupted {
            path: self.db_path.clone(),
            reason: "connection lock poisoned".to_string(),
        })
    }
}

impl CheckpointStore for SqliteStore {
    fn read(&self) -> Result<Option<Vec<u8>>, CheckpointError> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT document FROM checkpoints WHERE key = ?",
            [&self.key],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()
        .map_err(|e| CheckpointError::Store(e.to_string()))
    }

    fn write(&self, document: &[u8]) -> Result<(), CheckpointError> {
        let mut conn = self.lock()?;

        let tx = conn
            .transaction()
            .map_err(|e| CheckpointError::Store(e.to_string()))?;

        tx.execute(
            "INSERT OR REPLACE INTO checkpoints (key, document, saved_at) VALUES (?, ?, ?)",
            params![self.key, document, chrono::Utc::now().timestamp()],
        )
        .map_err(|e| CheckpointError::Store(e.to_string()))?;

        tx.commit()
            .map_err(|e| CheckpointError::Store(e.to_string()))?;

        Ok(())
    }

    fn remove(&self) -> Result<bool, CheckpointError> {
        let conn = self.lock()?;

        let deleted = conn
            .execute("DELETE FROM checkpoints WHERE key = ?", [&self.key])
            .map_err(|e| CheckpointError::Store(e.to_string()))?;

        Ok(deleted > 0)
    }

    fn location(&self) -> PathBuf {
        self.db_path.clone()
    }
}
