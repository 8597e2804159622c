//! Push/pull engine.
//!
//! A pass reads the dirty queue once, partitions it by pending op and drains
//! the buckets in dependency order: creates, updates, deletes. Rows within a
//! bucket go oldest mutation first and strictly one at a time. A row's
//! failure is recorded and the pass moves on; the row stays dirty.
//!
//! Rows are cleared with [`TaskRepository::mark_synced_if_unchanged`], so a
//! local mutation that lands while its row is in flight stays queued for the
//! next pass.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use taskline_core::{PendingOp, Task, TaskId, now_millis};
use taskline_tasks::{TaskError, TaskRepository};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::connectivity::NetworkState;
use crate::remote::{RemoteError, RemoteTaskApi};
use crate::result::{PullResult, SkipReason, SyncResult, SyncStatus, SyncSummary};

/// Reconnect behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Run a pass on every offline→online transition.
    pub auto_sync_on_reconnect: bool,
    /// Pull the remote list after a reconnect pass.
    pub pull_on_reconnect: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync_on_reconnect: true,
            pull_on_reconnect: true,
        }
    }
}

/// Failure while pushing a single row.
#[derive(Debug, Error)]
enum PushError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("local store: {0}")]
    Local(#[from] TaskError),
}

/// Dirty rows split by pending op, each bucket in queue order.
#[derive(Debug, Default)]
struct PendingQueue {
    creates: Vec<Task>,
    updates: Vec<Task>,
    deletes: Vec<Task>,
}

impl PendingQueue {
    fn partition(dirty: Vec<Task>) -> Self {
        let mut queue = Self::default();
        for task in dirty {
            match task.pending_op {
                Some(PendingOp::Create) => queue.creates.push(task),
                Some(PendingOp::Update) => queue.updates.push(task),
                Some(PendingOp::Delete) => queue.deletes.push(task),
                None => {}
            }
        }
        queue
    }

    fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }

    fn buckets(&self) -> [(PendingOp, &[Task]); 3] {
        [
            (PendingOp::Create, self.creates.as_slice()),
            (PendingOp::Update, self.updates.as_slice()),
            (PendingOp::Delete, self.deletes.as_slice()),
        ]
    }
}

/// Holds the single-flight flag; released on drop.
struct SyncGuard<'a>(&'a AtomicBool);

impl<'a> SyncGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Reconciles the local task store with the remote API.
pub struct SyncEngine {
    repo: TaskRepository,
    remote: Arc<dyn RemoteTaskApi>,
    network: watch::Receiver<NetworkState>,
    config: SyncConfig,
    syncing: AtomicBool,
    listener_started: AtomicBool,
    last_sync: Mutex<Option<SyncSummary>>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("online", &self.is_online())
            .field("syncing", &self.is_syncing())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Create an engine reading connectivity from `network`.
    pub fn new(
        repo: TaskRepository,
        remote: Arc<dyn RemoteTaskApi>,
        network: watch::Receiver<NetworkState>,
        config: SyncConfig,
    ) -> Self {
        Self {
            repo,
            remote,
            network,
            config,
            syncing: AtomicBool::new(false),
            listener_started: AtomicBool::new(false),
            last_sync: Mutex::new(None),
        }
    }

    /// The repository this engine drains.
    pub fn repository(&self) -> &TaskRepository {
        &self.repo
    }

    /// Latest connectivity state.
    pub fn is_online(&self) -> bool {
        self.network.borrow().is_online()
    }

    /// Whether a pass is running.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Push every pending mutation.
    ///
    /// Returns immediately with a skipped result when offline or when another
    /// pass is running; neither case touches the network.
    #[instrument(skip_all, name = "sync_pass")]
    pub async fn run_sync(&self) -> SyncResult {
        if !self.is_online() {
            debug!("sync skipped: offline");
            return SyncResult::rejected(SkipReason::Offline);
        }
        let Some(_guard) = SyncGuard::acquire(&self.syncing) else {
            debug!("sync skipped: pass already running");
            return SyncResult::rejected(SkipReason::AlreadySyncing);
        };

        let started = Instant::now();
        let result = self.push_pending().await;
        info!(
            success = result.success,
            synced = result.synced_tasks,
            errors = result.errors.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "sync pass finished"
        );
        self.record(&result);
        result
    }

    async fn push_pending(&self) -> SyncResult {
        let dirty = match self.repo.list_dirty() {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "failed to read pending tasks");
                return SyncResult::failed(format!("failed to read pending tasks: {e}"));
            }
        };
        let queue = PendingQueue::partition(dirty);
        debug!(
            total = queue.len(),
            creates = queue.creates.len(),
            updates = queue.updates.len(),
            deletes = queue.deletes.len(),
            "pending queue"
        );

        let mut result = SyncResult::started();
        for (op, tasks) in queue.buckets() {
            for task in tasks {
                match self.push(op, task).await {
                    Ok(()) => result.synced_tasks += 1,
                    Err(e) => {
                        warn!(task_id = %task.id, %op, error = %e, "push failed, row stays queued");
                        result.errors.push(format!("{op} {}: {e}", task.id));
                    }
                }
            }
        }
        result
    }

    async fn push(&self, op: PendingOp, task: &Task) -> Result<(), PushError> {
        match op {
            PendingOp::Create => {
                let created = self.remote.create_task(&task.fields()).await?;
                let id = self.adopt(&task.id, &created.id)?;
                self.clear(&id, task.updated_at)
            }
            PendingOp::Update => {
                let _ = self.remote.update_task(&task.id, &task.fields()).await?;
                self.clear(&task.id, task.updated_at)
            }
            PendingOp::Delete => {
                self.remote.delete_task(&task.id).await?;
                self.clear(&task.id, task.updated_at)
            }
        }
    }

    /// Rekey a freshly created row to the identity the remote side assigned.
    /// Returns the id the row now has.
    fn adopt(&self, local: &TaskId, remote: &TaskId) -> Result<TaskId, PushError> {
        if local == remote {
            return Ok(local.clone());
        }
        match self.repo.adopt_remote_id(local, remote) {
            Ok(true) => Ok(remote.clone()),
            Ok(false) => Ok(local.clone()),
            Err(TaskError::Conflict(message)) => {
                // Already pulled under the remote id. The local row keeps an id the
                // remote side never issued, so later edits to it cannot be pushed.
                warn!(
                    local_id = %local,
                    remote_id = %remote,
                    reason = %message,
                    "remote id already present locally, local row left orphaned"
                );
                Ok(local.clone())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self, id: &TaskId, updated_at: i64) -> Result<(), PushError> {
        if self.repo.mark_synced_if_unchanged(id, updated_at)? == 0 {
            debug!(task_id = %id, "row changed during push, left queued");
        }
        Ok(())
    }

    fn record(&self, result: &SyncResult) {
        *self.last_sync.lock() = Some(SyncSummary {
            finished_at: now_millis(),
            success: result.success,
            synced_tasks: result.synced_tasks,
            error_count: result.errors.len(),
        });
    }

    /// Apply the remote list to the local store.
    ///
    /// Local rows missing from the response are left alone. A row that cannot
    /// be written is recorded in `errors` and the rest of the list is still
    /// applied.
    #[instrument(skip_all, name = "pull")]
    pub async fn pull_latest(&self) -> PullResult {
        if !self.is_online() {
            debug!("pull skipped: offline");
            return PullResult::rejected(SkipReason::Offline);
        }
        let remote_tasks = match self.remote.list_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %e, "failed to fetch remote tasks");
                return PullResult::failed(format!("failed to fetch remote tasks: {e}"));
            }
        };

        let mut result = PullResult::started();
        for remote in &remote_tasks {
            match self.repo.upsert_from_server(remote) {
                Ok(_) => result.pulled += 1,
                Err(e) => {
                    error!(task_id = %remote.id, error = %e, "failed to apply remote task");
                    result.errors.push(format!("apply {}: {e}", remote.id));
                }
            }
        }
        info!(pulled = result.pulled, failed = result.errors.len(), "pull finished");
        result
    }

    /// Push, then pull.
    pub async fn sync_and_pull(&self) -> (SyncResult, PullResult) {
        let pushed = self.run_sync().await;
        let pulled = self.pull_latest().await;
        (pushed, pulled)
    }

    /// Snapshot of connectivity, activity and queue depth.
    pub fn status(&self) -> Result<SyncStatus, TaskError> {
        Ok(SyncStatus {
            online: self.is_online(),
            syncing: self.is_syncing(),
            pending: self.repo.pending_count()?,
            last_sync: self.last_sync.lock().clone(),
        })
    }

    /// Start the task that reacts to offline→online transitions.
    ///
    /// Only one listener runs per engine; later calls return `None`. The task
    /// ends when the connectivity sender is dropped.
    pub fn spawn_reconnect_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.listener_started.swap(true, Ordering::AcqRel) {
            warn!("reconnect listener already running");
            return None;
        }
        let engine = Arc::clone(self);
        let mut rx = self.network.clone();
        // Baseline taken now so a transition that races the first poll is still seen.
        let mut previous = *rx.borrow_and_update();
        Some(tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let current = *rx.borrow_and_update();
                if previous.is_reconnect(current) {
                    engine.on_reconnect().await;
                }
                previous = current;
            }
            debug!("connectivity channel closed, reconnect listener exiting");
        }))
    }

    async fn on_reconnect(&self) {
        if !self.config.auto_sync_on_reconnect {
            debug!("reconnected, auto sync disabled");
            return;
        }
        info!("reconnected, starting sync");
        let pushed = self.run_sync().await;
        if !pushed.is_clean() {
            warn!(errors = ?pushed.errors, "reconnect sync finished with errors");
        }
        if self.config.pull_on_reconnect {
            let pulled = self.pull_latest().await;
            if let Some(error) = pulled.error {
                warn!(%error, "reconnect pull failed");
            } else if !pulled.errors.is_empty() {
                warn!(errors = ?pulled.errors, "reconnect pull skipped some rows");
            }
        }
    }
}
