//! # taskline
//!
//! Operator CLI over the local task store: loads settings, opens and migrates
//! the database, runs one subcommand and prints its JSON result.

#![deny(unsafe_code)]

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use taskline_core::logging::init_subscriber;
use taskline_settings::{StoreSettings, load_settings};
use taskline_store::{ConnectionConfig, LocalStore, run_migrations};
use taskline_tasks::TaskRepository;

use crate::cli::Cli;

fn connection_config(settings: &StoreSettings) -> ConnectionConfig {
    ConnectionConfig {
        pool_size: settings.pool_size,
        busy_timeout_ms: settings.busy_timeout_ms,
        cache_size_kib: settings.cache_size_kib,
    }
}

fn open_store(path: &Path, settings: &StoreSettings) -> Result<LocalStore> {
    let name = path
        .to_str()
        .with_context(|| format!("database path is not valid UTF-8: {}", path.display()))?;
    let store = LocalStore::open(name, connection_config(settings))
        .with_context(|| format!("failed to open database {name}"))?;
    let _ = run_migrations(&store).context("failed to migrate database")?;
    Ok(store)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings().context("failed to load settings")?;
    init_subscriber(cli.log_level.as_deref().unwrap_or(&settings.logging.level));

    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| settings.store.resolved_path());
    tracing::debug!(db = %db_path.display(), "opening task store");
    let store = open_store(&db_path, &settings.store)?;
    let repo = TaskRepository::new(Arc::new(store));

    let output = cli.command.run(&repo)?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    repo.store().close();
    Ok(())
}
