//! # taskline-store
//!
//! Persistent relational store for Taskline, backed by `SQLite`.
//!
//! - **[`connection`]**: `r2d2` connection pool with WAL mode and pragmas
//!   applied to every connection.
//! - **[`local_store`]**: [`LocalStore`], the explicit store handle: open/close,
//!   single statements, queries, and atomic transactions. Owns no business logic.
//! - **[`migrations`]**: idempotent task schema setup plus the single-row
//!   `schema_version` table.

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod local_store;
pub mod migrations;

pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection};
pub use errors::{Result, StoreError};
pub use local_store::{ExecOutcome, IN_MEMORY, LocalStore, StoreTx};
pub use migrations::{get_version, latest_version, run_migrations, set_version};
