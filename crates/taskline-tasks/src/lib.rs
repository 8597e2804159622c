//! # taskline-tasks
//!
//! The only writer of task rows. [`TaskRepository`] wraps a shared
//! [`LocalStore`](taskline_store::LocalStore) and keeps the dirty bit,
//! tombstone and pending op of every row consistent, which is what makes the
//! unsynced-mutation queue ([`TaskRepository::list_dirty`]) trustworthy.

#![deny(unsafe_code)]

pub mod errors;
pub mod repository;

pub use errors::{InconsistentRow, Result, TaskError};
pub use repository::TaskRepository;
