//! # taskline-sync
//!
//! Reconciles the local task store with a remote system of record.
//!
//! - **Push**: [`SyncEngine::run_sync`] drains the repository's dirty queue in
//!   one single-flight pass: all creates, then all updates, then all deletes,
//!   each bucket oldest mutation first, one remote request at a time. A failed
//!   row stays dirty and is retried by the next pass.
//! - **Pull**: [`SyncEngine::pull_latest`] upserts the remote snapshot into
//!   the local store.
//! - **Connectivity**: [`Connectivity`] owns a `watch` channel of
//!   [`NetworkState`]; the engine reads it for its `online` flag and its
//!   reconnect listener runs a pass on every offline→online transition.
//!
//! The HTTP client behind [`RemoteTaskApi`] lives outside this crate.

#![deny(unsafe_code)]

pub mod connectivity;
pub mod engine;
pub mod remote;
pub mod result;

pub use connectivity::{Connectivity, NetworkState};
pub use engine::{SyncConfig, SyncEngine};
pub use remote::{RemoteError, RemoteTaskApi};
pub use result::{PullResult, SkipReason, SyncResult, SyncStatus, SyncSummary};
