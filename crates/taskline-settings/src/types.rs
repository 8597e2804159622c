//! Settings type definitions.
//!
//! JSON field names are camelCase. Every section is `#[serde(default)]`, so a
//! settings file only needs the keys it changes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Accepted range for `store.poolSize`.
pub const POOL_SIZE_RANGE: std::ops::RangeInclusive<u32> = 1..=64;

/// Accepted range for `store.busyTimeoutMs`.
pub const BUSY_TIMEOUT_RANGE: std::ops::RangeInclusive<u32> = 100..=600_000;

/// Root settings type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TasklineSettings {
    /// Local database.
    pub store: StoreSettings,
    /// Sync engine behavior.
    pub sync: SyncSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Local database settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Database file; a leading `~/` expands to the home directory, and
    /// `:memory:` opens a private in-memory database.
    pub path: String,
    /// Maximum pooled connections for a file database.
    pub pool_size: u32,
    /// `SQLite` busy timeout.
    pub busy_timeout_ms: u32,
    /// Page cache size in KiB.
    pub cache_size_kib: i64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: "~/.taskline/tasks.db".to_string(),
            pool_size: 4,
            busy_timeout_ms: 5_000,
            cache_size_kib: 2048,
        }
    }
}

impl StoreSettings {
    /// `path` with a leading `~/` expanded against `$HOME`.
    pub fn resolved_path(&self) -> PathBuf {
        expand_home(&self.path)
    }
}

/// Sync engine settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Run a sync pass when connectivity comes back.
    pub auto_sync_on_reconnect: bool,
    /// Pull the remote list after a reconnect pass.
    pub pull_on_reconnect: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auto_sync_on_reconnect: true,
            pull_on_reconnect: true,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter level; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

pub(crate) fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(path),
    }
}
