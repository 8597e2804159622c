//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TasklineSettings::default()`]
//! 2. If `~/.taskline/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Reject out-of-range values that came from the file
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{BUSY_TIMEOUT_RANGE, POOL_SIZE_RANGE, TasklineSettings, home_dir};

/// Resolve the path to the settings file (`~/.taskline/settings.json`).
pub fn settings_path() -> PathBuf {
    home_dir().join(".taskline").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TasklineSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an out-of-range value is
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<TasklineSettings> {
    let defaults = serde_json::to_value(TasklineSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: TasklineSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Layer `overlay` on top of `base`.
///
/// Nested objects merge key by key; any other overlay value replaces what was
/// there. A `null` in the overlay leaves the base value in place, so a settings
/// file can write `"sync": null` without wiping the defaults.
pub fn deep_merge(mut base: Value, overlay: Value) -> Value {
    overlay_into(&mut base, overlay);
    base
}

fn overlay_into(slot: &mut Value, overlay: Value) {
    match (slot, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(fields)) => {
            for (key, value) in fields {
                match base.get_mut(&key) {
                    Some(existing) => overlay_into(existing, value),
                    None if !value.is_null() => {
                        let _ = base.insert(key, value);
                    }
                    None => {}
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply `TASKLINE_*` environment variables to loaded settings.
pub fn apply_env_overrides(settings: &mut TasklineSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Integers must parse and fall within range; booleans accept
/// `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`. Invalid values are
/// logged and ignored. Empty strings count as unset.
pub fn apply_overrides(settings: &mut TasklineSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Store ───────────────────────────────────────────────────────
    if let Some(v) = read("TASKLINE_DB_PATH") {
        settings.store.path = v;
    }
    if let Some(n) = read("TASKLINE_POOL_SIZE")
        .and_then(|v| checked("TASKLINE_POOL_SIZE", &v, parse_u32_range(&v, POOL_SIZE_RANGE)))
    {
        settings.store.pool_size = n;
    }
    if let Some(n) = read("TASKLINE_BUSY_TIMEOUT_MS").and_then(|v| {
        checked(
            "TASKLINE_BUSY_TIMEOUT_MS",
            &v,
            parse_u32_range(&v, BUSY_TIMEOUT_RANGE),
        )
    }) {
        settings.store.busy_timeout_ms = n;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("TASKLINE_LOG_LEVEL") {
        settings.logging.level = v;
    }

    // ── Sync ────────────────────────────────────────────────────────
    if let Some(b) =
        read("TASKLINE_AUTO_SYNC").and_then(|v| checked("TASKLINE_AUTO_SYNC", &v, parse_bool(&v)))
    {
        settings.sync.auto_sync_on_reconnect = b;
    }
    if let Some(b) = read("TASKLINE_PULL_ON_RECONNECT")
        .and_then(|v| checked("TASKLINE_PULL_ON_RECONNECT", &v, parse_bool(&v)))
    {
        settings.sync.pull_on_reconnect = b;
    }
}

fn checked<T>(name: &str, raw: &str, parsed: Option<T>) -> Option<T> {
    if parsed.is_none() {
        warn!(key = name, value = %raw, "invalid env var, ignoring");
    }
    parsed
}

fn validate(settings: &TasklineSettings) -> Result<()> {
    let store = &settings.store;
    if !POOL_SIZE_RANGE.contains(&store.pool_size) {
        return Err(SettingsError::InvalidValue(format!(
            "store.poolSize must be {}..={}, got {}",
            POOL_SIZE_RANGE.start(),
            POOL_SIZE_RANGE.end(),
            store.pool_size
        )));
    }
    if !BUSY_TIMEOUT_RANGE.contains(&store.busy_timeout_ms) {
        return Err(SettingsError::InvalidValue(format!(
            "store.busyTimeoutMs must be {}..={}, got {}",
            BUSY_TIMEOUT_RANGE.start(),
            BUSY_TIMEOUT_RANGE.end(),
            store.busy_timeout_ms
        )));
    }
    if store.path.trim().is_empty() {
        return Err(SettingsError::InvalidValue(
            "store.path must not be empty".to_string(),
        ));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Read an env-style flag. Surrounding whitespace and letter case are ignored.
pub fn parse_bool(val: &str) -> Option<bool> {
    const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];
    const FALSY: [&str; 4] = ["false", "0", "no", "off"];
    let val = val.trim();
    if TRUTHY.iter().any(|t| t.eq_ignore_ascii_case(val)) {
        Some(true)
    } else if FALSY.iter().any(|f| f.eq_ignore_ascii_case(val)) {
        Some(false)
    } else {
        None
    }
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, range: std::ops::RangeInclusive<u32>) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    range.contains(&n).then_some(n)
}
