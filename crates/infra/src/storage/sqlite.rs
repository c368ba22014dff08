//! SQLite key-value backend
//!
//! One `kv` table keyed by the store key. Expiry is stored as unix
//! milliseconds and checked against the injected clock on read, so expired
//! rows behave as missing until [`SqliteKv::purge_expired`] removes them.
//! All database work runs in `spawn_blocking`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calsync_common::Clock;
use calsync_core::KvStore;
use calsync_domain::{CalsyncError, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tokio::task;
use tracing::info;

use crate::errors::InfraError;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY,
    value      BLOB NOT NULL,
    expires_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_kv_expires_at ON kv (expires_at) WHERE expires_at IS NOT NULL;
";

const POOL_SIZE: u32 = 8;

type SqlitePool = Pool<SqliteConnectionManager>;
type SqliteConnection = PooledConnection<SqliteConnectionManager>;

pub struct SqliteKv {
    pool: Arc<SqlitePool>,
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl SqliteKv {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open<P: AsRef<Path>>(path: P, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
        });
        let pool = Pool::builder().max_size(POOL_SIZE).build(manager).map_err(map_error)?;

        let conn = pool.get().map_err(map_error)?;
        conn.execute_batch(SCHEMA_SQL).map_err(map_error)?;

        info!(db_path = %path.display(), max_connections = POOL_SIZE, "sqlite kv store opened");
        Ok(Self { pool: Arc::new(pool), path, clock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete rows whose expiry has passed. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<usize> {
        let now = self.now_millis();
        self.with_connection(move |conn| {
            conn.execute("DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?1", params![now])
        })
        .await
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    async fn with_connection<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> rusqlite::Result<T> + Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        task::spawn_blocking(move || -> Result<T> {
            let mut conn = pool.get().map_err(map_error)?;
            work(&mut conn).map_err(map_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_error<E: Into<InfraError>>(err: E) -> CalsyncError {
    err.into().0
}

fn map_join_error(err: task::JoinError) -> CalsyncError {
    CalsyncError::Internal(format!("sqlite task failed: {err}"))
}

fn read_live(conn: &rusqlite::Connection, key: &str, now: i64) -> rusqlite::Result<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT value FROM kv WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
        params![key, now],
        |row| row.get(0),
    )
    .optional()
}

#[async_trait]
impl KvStore for SqliteKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = key.to_string();
        let now = self.now_millis();
        self.with_connection(move |conn| read_live(conn, &key, now)).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let key = key.to_string();
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, NULL)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = NULL",
                params![key, value],
            )
            .map(|_| ())
        })
        .await
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let ttl_ms = i64::try_from(ttl.as_millis())
            .map_err(|_| CalsyncError::Validation(format!("ttl out of range: {ttl:?}")))?;
        let expires_at = self.now_millis().saturating_add(ttl_ms);
        let key = key.to_string();
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
                params![key, value, expires_at],
            )
            .map(|_| ())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_connection(move |conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key]).map(|_| ())
        })
        .await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<Vec<u8>>,
        value: Vec<u8>,
    ) -> Result<bool> {
        let key = key.to_string();
        let now = self.now_millis();
        self.with_connection(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current = read_live(&tx, &key, now)?;
            if current != expected {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, NULL)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = NULL",
                params![key, value],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
    }
}
