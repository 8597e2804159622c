//! # taskline-core
//!
//! Foundation types shared by every Taskline crate:
//!
//! - **Task model**: [`Task`], the closed enums [`ActionCategory`] and
//!   [`PendingOp`], the typed [`TaskPatch`], and the remote wire shapes
//!   [`TaskFields`] / [`RemoteTask`]
//! - **Ids**: [`TaskId`], time-ordered UUID v7 with a `task-` prefix
//! - **Clock**: the local logical clock in milliseconds since epoch
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod clock;
pub mod ids;
pub mod logging;
pub mod task;

pub use clock::now_millis;
pub use ids::TaskId;
pub use task::{
    ActionCategory, NewTask, ParseEnumError, PendingOp, RemoteTask, Task, TaskFields, TaskPatch,
};
