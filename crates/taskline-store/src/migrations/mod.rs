//! Schema setup for the task database.
//!
//! Migration SQL is embedded at compile time via [`include_str!`]. Every
//! statement is create-if-absent, so [`run_migrations`] executes all of them
//! on each start; it is safe to call any number of times and never produces
//! duplicate structures.
//!
//! `schema_version` is a single-row table. The runner records the latest
//! version it knows about there, but does not yet branch on the stored value.

use rusqlite::params;
use tracing::{debug, info};

use crate::errors::{Result, StoreError};
use crate::local_store::LocalStore;

/// A single migration with a version number and SQL to execute.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in version order.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "tasks table with sync bookkeeping and feed/sync/filter indexes",
    sql: include_str!("v001_tasks.sql"),
}];

const VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER);";

/// Ensure the task schema exists and record the latest schema version.
///
/// Each migration runs in its own transaction together with its version
/// write. Returns how many versions were newly recorded (0 on every run after
/// the first).
///
/// A store that was never initialized fails with [`StoreError::NotInitialized`].
pub fn run_migrations(store: &LocalStore) -> Result<u32> {
    if !store.is_open() {
        return Err(StoreError::NotInitialized);
    }
    store
        .execute_batch(VERSION_TABLE)
        .map_err(|e| StoreError::Migration {
            message: format!("failed to create schema_version table: {e}"),
        })?;
    let current = get_version(store)?;
    let mut recorded = 0;

    for migration in MIGRATIONS {
        let is_new = migration.version > current;
        if is_new {
            info!(
                version = migration.version,
                description = migration.description,
                "applying migration"
            );
        } else {
            debug!(
                version = migration.version,
                "migration already recorded, re-checking schema"
            );
        }

        store
            .transaction(|tx| {
                tx.execute_batch(migration.sql)?;
                if is_new {
                    replace_version(tx, migration.version)?;
                }
                Ok(())
            })
            .map_err(|e| StoreError::Migration {
                message: format!(
                    "migration v{} ({}) failed: {}",
                    migration.version,
                    migration.description,
                    e.root()
                ),
            })?;

        if is_new {
            recorded += 1;
        }
    }

    if recorded > 0 {
        info!(recorded, version = latest_version(), "migrations complete");
    }
    Ok(recorded)
}

/// Stored schema version, or 0 when none has been recorded.
pub fn get_version(store: &LocalStore) -> Result<u32> {
    if !store.is_open() {
        return Err(StoreError::NotInitialized);
    }
    let version = store
        .query_one(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Migration {
            message: format!("failed to read schema_version: {e}"),
        })?;
    Ok(version.unwrap_or(0))
}

/// Overwrite the stored schema version.
pub fn set_version(store: &LocalStore, version: u32) -> Result<()> {
    store.transaction(|tx| replace_version(tx, version))
}

/// Latest migration version defined in code.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

fn replace_version(tx: &crate::local_store::StoreTx<'_>, version: u32) -> Result<()> {
    let _ = tx.execute("DELETE FROM schema_version", [])?;
    let _ = tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        params![version],
    )?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
