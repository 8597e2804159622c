//! Task repository error types.
//!
//! Repository errors are never swallowed: a failed local write always comes
//! back to the caller.

use taskline_store::StoreError;
use thiserror::Error;

/// Errors from task repository operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The local store failed (not initialized, SQL error, rolled-back transaction).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Input rejected before touching the store.
    #[error("validation error: {0}")]
    Validation(String),

    /// An id rewrite would collide with an existing row.
    #[error("id conflict: {0}")]
    Conflict(String),
}

impl From<rusqlite::Error> for TaskError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(err))
    }
}

/// Stored row whose `dirty` and `op` columns disagree.
#[derive(Debug, Error)]
#[error("task {id} has dirty={dirty} but op={op:?}")]
pub struct InconsistentRow {
    /// Row id.
    pub id: String,
    /// Stored dirty bit.
    pub dirty: bool,
    /// Stored op column.
    pub op: Option<String>,
}

/// Convenience alias for repository results.
pub type Result<T> = std::result::Result<T, TaskError>;
