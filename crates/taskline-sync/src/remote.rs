//! Contract of the remote system of record.
//!
//! Transport concerns (HTTP, auth headers, per-request timeouts and
//! transport-level retries) belong to the implementation.

use async_trait::async_trait;
use taskline_core::{RemoteTask, TaskFields, TaskId};
use thiserror::Error;

/// Failure of a single remote request.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The request could not be completed (network, timeout, decode).
    #[error("request failed: {message}")]
    Request {
        /// Transport-level description.
        message: String,
    },

    /// The remote side does not know the task.
    #[error("remote task not found: {0}")]
    NotFound(String),

    /// The remote side refused the request.
    #[error("rejected with status {status}: {message}")]
    Rejected {
        /// Status code reported by the remote side.
        status: u16,
        /// Reason given by the remote side.
        message: String,
    },
}

impl RemoteError {
    /// Shorthand for [`RemoteError::Request`].
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }
}

/// Request/response surface the sync engine pushes to and pulls from.
#[async_trait]
pub trait RemoteTaskApi: Send + Sync {
    /// Create a task; the response carries the identity the remote side assigned.
    async fn create_task(&self, fields: &TaskFields) -> Result<RemoteTask, RemoteError>;

    /// Replace the mutable fields of an existing task.
    async fn update_task(&self, id: &TaskId, fields: &TaskFields)
    -> Result<RemoteTask, RemoteError>;

    /// Delete a task.
    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteError>;

    /// Current authoritative list of tasks.
    async fn list_tasks(&self) -> Result<Vec<RemoteTask>, RemoteError>;
}
