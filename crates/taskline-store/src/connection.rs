//! `SQLite` connection pool.
//!
//! Uses `r2d2` with the `r2d2_sqlite` backend. Pragmas are session state in
//! SQLite, so they are applied in the pool's acquire hook rather than once
//! after opening.

use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::Result;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool and pragma configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Maximum pool size for file databases (default: 4).
    pub pool_size: u32,
    /// Busy timeout in milliseconds (default: 5000).
    pub busy_timeout_ms: u32,
    /// Page cache size in KiB (default: 2048).
    pub cache_size_kib: i64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            busy_timeout_ms: 5_000,
            cache_size_kib: 2048,
        }
    }
}

/// Settings every pooled connection gets on acquire.
#[derive(Debug)]
struct SessionPragmas {
    busy_timeout_ms: u32,
    cache_size_kib: i64,
}

impl SessionPragmas {
    fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            busy_timeout_ms: config.busy_timeout_ms,
            cache_size_kib: config.cache_size_kib,
        }
    }

    /// Negative `cache_size` is read by SQLite as KiB rather than pages.
    fn batch(&self) -> String {
        [
            "PRAGMA journal_mode = WAL".to_string(),
            format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms),
            "PRAGMA foreign_keys = ON".to_string(),
            format!("PRAGMA cache_size = -{}", self.cache_size_kib),
            "PRAGMA synchronous = NORMAL".to_string(),
        ]
        .join(";\n")
    }
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for SessionPragmas {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&self.batch())
    }
}

fn build(manager: SqliteConnectionManager, max_size: u32, config: &ConnectionConfig) -> Result<ConnectionPool> {
    Ok(Pool::builder()
        .max_size(max_size)
        .connection_timeout(Duration::from_secs(5))
        // Recycling the only in-memory connection would drop its database.
        .max_lifetime(None)
        .idle_timeout(None)
        .connection_customizer(Box::new(SessionPragmas::from_config(config)))
        .build(manager)?)
}

/// Create an in-memory pool.
///
/// Every in-memory connection is its own database, so the pool holds exactly
/// one connection regardless of `config.pool_size`.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    build(SqliteConnectionManager::memory(), 1, config)
}

/// Create a file-backed pool, creating missing parent directories.
pub fn new_file(path: &Path, config: &ConnectionConfig) -> Result<ConnectionPool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    build(
        SqliteConnectionManager::file(path),
        config.pool_size.max(1),
        config,
    )
}

/// Current `journal_mode` of a connection (`wal` for files, `memory` in memory).
pub fn journal_mode(conn: &Connection) -> Result<String> {
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    Ok(mode)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
