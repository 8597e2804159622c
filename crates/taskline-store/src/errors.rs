//! Error types for the local store.

use thiserror::Error;

/// Errors raised by [`LocalStore`](crate::LocalStore) and the migration manager.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store was used before a successful `init` (or after `close`).
    #[error("local store is not initialized")]
    NotInitialized,

    /// A statement inside a transaction failed; every statement of that
    /// transaction has been rolled back.
    #[error("transaction rolled back: {0}")]
    TransactionFailure(#[source] Box<StoreError>),

    /// `SQLite` error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Filesystem error while preparing the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Which step failed and why.
        message: String,
    },
}

impl StoreError {
    /// The error that caused a transaction to roll back, or `self`.
    pub fn root(&self) -> &StoreError {
        match self {
            Self::TransactionFailure(inner) => inner.root(),
            other => other,
        }
    }
}

/// Convenience alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
