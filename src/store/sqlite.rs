//! SQLite idempotency store

use super::{keys, IdempotencyStore};
use crate::{BridgeError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to SQLite database file
    pub path: PathBuf,

    /// Enable WAL mode for better concurrency
    pub wal_mode: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            wal_mode: true,
        }
    }
}

/// `~/.config/deskbridge/state.db`
pub fn default_path() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".config");
    path.push("deskbridge");
    path.push("state.db");
    path
}

/// SQLite-backed [`IdempotencyStore`]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open or create a store database
    pub fn open(config: StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %config.path.display(), "Opening state database");

        let conn = Connection::open(&config.path)?;
        if config.wal_mode {
            conn.pragma_update(None, "journal_mode", &"WAL")?;
        }

        let store = Self {
            conn: Mutex::new(conn),
            path: config.path,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a throwaway in-memory database
    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: PathBuf::from(":memory:"),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn init_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS seen (
                key TEXT PRIMARY KEY,
                seen_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS last_seen (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BridgeError::Other("state database lock poisoned".to_string()))
    }

    /// Number of seen-set entries across all namespaces
    pub fn seen_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM seen", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl IdempotencyStore for SqliteStore {
    fn is_seen(&self, namespace: &str, id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT 1 FROM seen WHERE key = ?1",
                params![keys::seen(namespace, id)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn mark_seen(&self, namespace: &str, id: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR IGNORE INTO seen (key, seen_at) VALUES (?1, ?2)",
            params![keys::seen(namespace, id), now()],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM last_seen WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO last_seen (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now()],
        )?;
        Ok(())
    }
}
