//! SQLite snapshot backend.
//!
//! Every namespace shares one `snapshots` table; the namespace name is part
//! of the primary key. Values are stored as JSON text.

use crate::backend::{CacheBackend, CacheNamespace};
use crate::error::CacheResult;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Persistent snapshot store backed by SQLite.
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCache {
    /// Opens (or creates) a snapshot database at the given path.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        debug!("Opened snapshot cache at {}", path.display());
        Self::with_connection(conn)
    }

    /// Opens an in-memory snapshot database.
    pub fn open_in_memory() -> CacheResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> CacheResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS snapshots (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            ",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl CacheBackend for SqliteCache {
    fn namespace(&self, name: &str) -> Arc<dyn CacheNamespace> {
        Arc::new(SqliteNamespace {
            conn: Arc::clone(&self.conn),
            name: name.to_string(),
        })
    }
}

struct SqliteNamespace {
    conn: Arc<Mutex<Connection>>,
    name: String,
}

impl SqliteNamespace {
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheNamespace for SqliteNamespace {
    fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM snapshots WHERE namespace = ?1 AND key = ?2",
                params![self.name, key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|text| serde_json::from_str::<Value>(&text))
            .transpose()
            .map_err(Into::into)
    }

    fn set(&self, key: &str, value: &Value) -> CacheResult<()> {
        let text = serde_json::to_string(value)?;
        self.conn().execute(
            "INSERT INTO snapshots (namespace, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
            params![self.name, key, text],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.conn().execute(
            "DELETE FROM snapshots WHERE namespace = ?1 AND key = ?2",
            params![self.name, key],
        )?;
        Ok(())
    }

    fn keys(&self) -> CacheResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT key FROM snapshots WHERE namespace = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![self.name], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}
