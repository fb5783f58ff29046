//! SQLite storage backend with connection pooling
//!
//! Values live in a single `kv` table. Every write stamps the row with the
//! next value of a database-wide revision counter kept in `meta`, which is how
//! writes from another process sharing the same file are detected. The
//! counter only grows, so a revision is never handed out twice even after the
//! newest row is removed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::StorageBackend;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Durable key-value store on a SQLite file
pub struct SqliteStorage {
    pool: DbPool,
    path: PathBuf,
    /// Last revision this instance wrote or observed, per key
    seen: Mutex<HashMap<String, i64>>,
}

impl SqliteStorage {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::persistence(&format!("creating {}", parent.display()), e)
                })?;
            }
        }

        let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            Ok(())
        });
        let pool = Pool::builder().max_size(4).build(manager)?;

        let storage = Self {
            pool,
            path,
            seen: Mutex::new(HashMap::new()),
        };
        storage.run_migrations()?;

        // Whatever is already on disk is the baseline, not an external change
        let baseline = storage.revisions()?;
        *storage.seen_lock()? = baseline;

        info!(path = %storage.path.display(), "Opened SQLite storage");
        Ok(storage)
    }

    /// Path to the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                revision INTEGER NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS meta (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );

            INSERT OR IGNORE INTO meta (name, value)
            SELECT 'revision', COALESCE(MAX(revision), 0) FROM kv;
            "#,
        )?;
        Ok(())
    }

    fn revisions(&self) -> Result<HashMap<String, i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key, revision FROM kv")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(rows)
    }

    fn seen_lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, i64>>> {
        self.seen
            .lock()
            .map_err(|_| Error::Persistence("revision map lock poisoned".into()))
    }
}

impl StorageBackend for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let revision: i64 = tx.query_row(
            "UPDATE meta SET value = value + 1 WHERE name = 'revision' RETURNING value",
            [],
            |row| row.get(0),
        )?;
        tx.execute(
            r#"
            INSERT INTO kv (key, value, revision)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                revision = excluded.revision,
                updated_at = datetime('now')
            "#,
            params![key, value, revision],
        )?;
        tx.commit()?;
        self.seen_lock()?.insert(key.to_string(), revision);
        debug!(key, revision, bytes = value.len(), "Stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        self.seen_lock()?.remove(key);
        Ok(())
    }

    fn poll_external(&self) -> Result<Vec<String>> {
        let current = self.revisions()?;
        let mut seen = self.seen_lock()?;

        let mut changed: Vec<String> = current
            .iter()
            .filter(|(key, rev)| seen.get(*key) != Some(*rev))
            .map(|(key, _)| key.clone())
            .collect();
        changed.extend(
            seen.keys()
                .filter(|key| !current.contains_key(*key))
                .cloned(),
        );
        changed.sort();

        *seen = current;
        Ok(changed)
    }
}
