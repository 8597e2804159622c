//! # taskline-settings
//!
//! Layered configuration for Taskline.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`TasklineSettings::default()`]
//! 2. **User file**: `~/.taskline/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TASKLINE_*` overrides (highest priority)
//!
//! Unlike a process-wide singleton, the loaded value is handed to whoever
//! builds the store and sync engine.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::{LoggingSettings, StoreSettings, SyncSettings, TasklineSettings};
