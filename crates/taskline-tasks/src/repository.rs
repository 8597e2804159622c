//! CRUD surface over the `tasks` table.
//!
//! Every local write stamps the sync bookkeeping columns:
//!
//! | operation | `dirty` | `op` | `deleted` |
//! |---|---|---|---|
//! | create | 1 | `create` | 0 |
//! | update | 1 | `update` | unchanged |
//! | delete | 1 | `delete` | 1 |
//! | mark synced | 0 | NULL | unchanged |
//! | upsert from server | 0 | NULL | 0 |
//!
//! All SQL text is fixed at compile time; patches are applied to the loaded
//! row in Rust and written back with a single full-row UPDATE.

use std::sync::Arc;

use rusqlite::types::Type;
use rusqlite::{Row, params};
use taskline_core::{
    ActionCategory, NewTask, PendingOp, RemoteTask, Task, TaskId, TaskPatch, now_millis,
};
use taskline_store::{LocalStore, StoreTx};
use tracing::debug;

use crate::errors::{InconsistentRow, Result, TaskError};

/// `SELECT <all task columns> FROM tasks <tail>`, assembled at compile time.
macro_rules! select_tasks {
    ($tail:literal) => {
        concat!(
            "SELECT id, title, description, completed, action_category, priority, goal_ref, \
             updated_at, deleted, dirty, op FROM tasks ",
            $tail
        )
    };
}

const INSERT_TASK: &str = "INSERT INTO tasks (id, title, description, completed, action_category, \
     priority, goal_ref, updated_at, deleted, dirty, op) \
     VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?7, 0, 1, ?8)";

const UPDATE_TASK: &str = "UPDATE tasks SET title = ?2, description = ?3, completed = ?4, \
     action_category = ?5, priority = ?6, goal_ref = ?7, updated_at = ?8, dirty = 1, op = ?9 \
     WHERE id = ?1";

const UPSERT_FROM_SERVER: &str = "INSERT INTO tasks (id, title, description, completed, \
     action_category, priority, goal_ref, updated_at, deleted, dirty, op) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 0, NULL) \
     ON CONFLICT(id) DO UPDATE SET \
       title = excluded.title, \
       description = excluded.description, \
       completed = excluded.completed, \
       action_category = excluded.action_category, \
       priority = excluded.priority, \
       goal_ref = excluded.goal_ref, \
       updated_at = COALESCE(?9, tasks.updated_at), \
       deleted = 0, dirty = 0, op = NULL";

/// Map a full task row (column order of [`select_tasks!`]).
fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let id: TaskId = row.get(0)?;
    let dirty: bool = row.get(9)?;
    let op: Option<PendingOp> = row.get(10)?;
    let pending_op = match (dirty, op) {
        (true, Some(op)) => Some(op),
        (false, None) => None,
        (dirty, op) => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                9,
                Type::Integer,
                Box::new(InconsistentRow {
                    id: id.into_inner(),
                    dirty,
                    op: op.map(|o| o.as_sql().to_string()),
                }),
            ));
        }
    };

    Ok(Task {
        id,
        title: row.get(1)?,
        description: row.get(2)?,
        completed: row.get(3)?,
        action_category: row.get(4)?,
        priority: row.get(5)?,
        goal_ref: row.get(6)?,
        updated_at: row.get(7)?,
        deleted: row.get(8)?,
        pending_op,
    })
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(TaskError::Validation("title must not be blank".to_string()));
    }
    Ok(())
}

fn load(tx: &StoreTx<'_>, id: &str) -> taskline_store::Result<Option<Task>> {
    tx.query_one(select_tasks!("WHERE id = ?1"), params![id], task_from_row)
}

/// Task repository over a shared local store.
#[derive(Clone, Debug)]
pub struct TaskRepository {
    store: Arc<LocalStore>,
}

impl TaskRepository {
    /// Wrap an initialized (and migrated) store.
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// The underlying store handle.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────
    // Local mutations
    // ─────────────────────────────────────────────────────────────────────

    /// Create a task with a fresh id, pending op `create`.
    pub fn create(&self, new: &NewTask) -> Result<Task> {
        validate_title(&new.title)?;
        let task = Task {
            id: TaskId::generate(),
            title: new.title.clone(),
            description: new.description.clone(),
            completed: false,
            action_category: new.action_category,
            priority: new.priority,
            goal_ref: new.goal_ref.clone(),
            updated_at: now_millis(),
            deleted: false,
            pending_op: Some(PendingOp::Create),
        };

        let _ = self.store.execute(
            INSERT_TASK,
            params![
                task.id,
                task.title,
                task.description,
                task.action_category,
                task.priority,
                task.goal_ref,
                task.updated_at,
                PendingOp::Create,
            ],
        )?;
        debug!(task_id = %task.id, "task created");
        Ok(task)
    }

    /// Apply `patch` to a live task and mark it pending `update`.
    ///
    /// Returns `Ok(None)` without writing when the id is unknown or the row is
    /// tombstoned. A pending `create` is overwritten with `update`.
    pub fn update(&self, id: &str, patch: &TaskPatch) -> Result<Option<Task>> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }

        let updated = self.store.transaction(|tx| {
            let Some(mut task) = load(tx, id)?.filter(|t| !t.deleted) else {
                return Ok(None);
            };
            patch.apply_to(&mut task);
            task.updated_at = now_millis();
            task.pending_op = Some(PendingOp::Update);

            let _ = tx.execute(
                UPDATE_TASK,
                params![
                    task.id,
                    task.title,
                    task.description,
                    task.completed,
                    task.action_category,
                    task.priority,
                    task.goal_ref,
                    task.updated_at,
                    PendingOp::Update,
                ],
            )?;
            Ok(Some(task))
        })?;

        match &updated {
            Some(task) => debug!(task_id = %task.id, "task updated"),
            None => debug!(task_id = id, "update skipped, task not found"),
        }
        Ok(updated)
    }

    /// Tombstone a live task. Returns the number of rows changed: 0 when the
    /// id is unknown or the row is already deleted.
    pub fn delete(&self, id: &str) -> Result<usize> {
        let outcome = self.store.execute(
            "UPDATE tasks SET deleted = 1, dirty = 1, op = ?2, updated_at = ?3
             WHERE id = ?1 AND deleted = 0",
            params![id, PendingOp::Delete, now_millis()],
        )?;
        debug!(task_id = id, changed = outcome.rows_affected, "task delete");
        Ok(outcome.rows_affected)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    /// Load a task, tombstoned or not.
    pub fn get(&self, id: &str) -> Result<Option<Task>> {
        Ok(self
            .store
            .query_one(select_tasks!("WHERE id = ?1"), params![id], task_from_row)?)
    }

    /// Live tasks, most recently changed first.
    pub fn list(&self) -> Result<Vec<Task>> {
        Ok(self.store.query_all(
            select_tasks!("WHERE deleted = 0 ORDER BY updated_at DESC, rowid DESC"),
            [],
            task_from_row,
        )?)
    }

    /// Every row including tombstones, most recently changed first.
    pub fn list_all(&self) -> Result<Vec<Task>> {
        Ok(self.store.query_all(
            select_tasks!("ORDER BY updated_at DESC, rowid DESC"),
            [],
            task_from_row,
        )?)
    }

    /// Live tasks with the given completion state.
    pub fn list_by_completion(&self, completed: bool) -> Result<Vec<Task>> {
        Ok(self.store.query_all(
            select_tasks!(
                "WHERE deleted = 0 AND completed = ?1 ORDER BY updated_at DESC, rowid DESC"
            ),
            params![completed],
            task_from_row,
        )?)
    }

    /// Live tasks in the given category.
    pub fn list_by_category(&self, category: ActionCategory) -> Result<Vec<Task>> {
        Ok(self.store.query_all(
            select_tasks!(
                "WHERE deleted = 0 AND action_category = ?1 ORDER BY updated_at DESC, rowid DESC"
            ),
            params![category],
            task_from_row,
        )?)
    }

    /// Every dirty row (tombstones included), oldest mutation first.
    ///
    /// Rows stamped in the same millisecond keep insertion order.
    pub fn list_dirty(&self) -> Result<Vec<Task>> {
        Ok(self.store.query_all(
            select_tasks!("WHERE dirty = 1 ORDER BY updated_at ASC, rowid ASC"),
            [],
            task_from_row,
        )?)
    }

    /// Number of rows waiting to be pushed.
    pub fn pending_count(&self) -> Result<usize> {
        let count: Option<i64> = self.store.query_one(
            "SELECT COUNT(*) FROM tasks WHERE dirty = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count.unwrap_or(0)).unwrap_or(0))
    }

    /// Number of live rows.
    pub fn count(&self) -> Result<usize> {
        let count: Option<i64> = self.store.query_one(
            "SELECT COUNT(*) FROM tasks WHERE deleted = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count.unwrap_or(0)).unwrap_or(0))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sync bookkeeping
    // ─────────────────────────────────────────────────────────────────────

    /// Clear the dirty bit and pending op. Idempotent; returns rows matched.
    pub fn mark_synced(&self, id: &str) -> Result<usize> {
        let outcome = self.store.execute(
            "UPDATE tasks SET dirty = 0, op = NULL WHERE id = ?1",
            params![id],
        )?;
        Ok(outcome.rows_affected)
    }

    /// Clear the dirty bit only if the row has not been mutated since it was
    /// read at `updated_at`. Returns 0 when a newer local mutation exists, which
    /// then stays queued for the next pass.
    pub fn mark_synced_if_unchanged(&self, id: &str, updated_at: i64) -> Result<usize> {
        let outcome = self.store.execute(
            "UPDATE tasks SET dirty = 0, op = NULL WHERE id = ?1 AND updated_at = ?2",
            params![id, updated_at],
        )?;
        Ok(outcome.rows_affected)
    }

    /// Insert or overwrite a row from the remote system of record.
    ///
    /// The result is always clean and live (`dirty=0, op=NULL, deleted=0`),
    /// including when it replaces a local tombstone or a pending local edit.
    /// Without a remote `updated_at`, an overwrite keeps the local timestamp,
    /// so applying the same remote row twice leaves the same final row.
    /// Titles are taken as sent; the blank-title check only guards local edits.
    pub fn upsert_from_server(&self, remote: &RemoteTask) -> Result<Task> {
        let insert_stamp = remote.updated_at.unwrap_or_else(now_millis);

        let task = self.store.transaction(|tx| {
            let _ = tx.execute(
                UPSERT_FROM_SERVER,
                params![
                    remote.id,
                    remote.title,
                    remote.description,
                    remote.completed,
                    remote.action_category,
                    remote.priority,
                    remote.goal_ref,
                    insert_stamp,
                    remote.updated_at,
                ],
            )?;
            load(tx, &remote.id)
        })?;

        task.ok_or_else(|| TaskError::Conflict(format!("upserted task {} vanished", remote.id)))
    }

    /// Rekey a row to the identity the remote side assigned on create.
    ///
    /// Returns `false` when the ids are already equal or `local_id` is unknown.
    /// Fails with [`TaskError::Conflict`] if a row with `remote_id` already exists.
    /// In that case nothing is rekeyed: the local row now duplicates the pulled
    /// one and its id is unknown to the remote side.
    pub fn adopt_remote_id(&self, local_id: &str, remote_id: &str) -> Result<bool> {
        if local_id == remote_id {
            return Ok(false);
        }

        // `None` means the remote id is already taken.
        let changed = self.store.transaction(|tx| {
            let taken: Option<i64> = tx.query_one(
                "SELECT 1 FROM tasks WHERE id = ?1",
                params![remote_id],
                |row| row.get(0),
            )?;
            if taken.is_some() {
                return Ok(None);
            }
            let outcome = tx.execute(
                "UPDATE tasks SET id = ?2 WHERE id = ?1",
                params![local_id, remote_id],
            )?;
            Ok(Some(outcome.rows_affected))
        })?;

        let Some(changed) = changed else {
            return Err(TaskError::Conflict(format!(
                "cannot rename {local_id} to {remote_id}: id already present"
            )));
        };
        if changed > 0 {
            debug!(local_id, remote_id, "adopted remote task id");
        }
        Ok(changed > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use taskline_store::{ConnectionConfig, IN_MEMORY, StoreError, run_migrations};

    fn setup() -> TaskRepository {
        let store = LocalStore::open(IN_MEMORY, ConnectionConfig::default()).unwrap();
        run_migrations(&store).unwrap();
        TaskRepository::new(Arc::new(store))
    }

    fn set_updated_at(repo: &TaskRepository, id: &str, at: i64) {
        repo.store()
            .execute(
                "UPDATE tasks SET updated_at = ?2 WHERE id = ?1",
                params![id, at],
            )
            .unwrap();
    }

    fn inconsistent_rows(repo: &TaskRepository) -> i64 {
        repo.store()
            .query_one(
                "SELECT COUNT(*) FROM tasks WHERE (dirty = 0) != (op IS NULL)",
                [],
                |row| row.get(0),
            )
            .unwrap()
            .unwrap()
    }

    fn remote(id: &str, title: &str) -> RemoteTask {
        RemoteTask {
            id: TaskId::from(id),
            title: title.into(),
            description: None,
            completed: false,
            action_category: ActionCategory::Do,
            priority: None,
            goal_ref: None,
            updated_at: None,
        }
    }

    // ── create ─────────────────────────────────────────────────────────

    #[test]
    fn create_stamps_pending_create() {
        let repo = setup();
        let task = repo
            .create(&NewTask {
                title: "Call plumber".into(),
                description: Some("kitchen sink".into()),
                action_category: ActionCategory::Delegate,
                priority: Some(1),
                goal_ref: Some("goal-home".into()),
            })
            .unwrap();

        assert!(task.id.is_local());
        assert_eq!(task.pending_op, Some(PendingOp::Create));
        assert!(task.is_dirty());
        assert!(!task.deleted);
        assert!(!task.completed);

        let stored = repo.get(&task.id).unwrap().unwrap();
        assert_eq!(stored, task);
    }

    #[test]
    fn create_rejects_blank_title() {
        let repo = setup();
        assert_matches!(
            repo.create(&NewTask::titled("   ")),
            Err(TaskError::Validation(_))
        );
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn create_assigns_unique_ids() {
        let repo = setup();
        let a = repo.create(&NewTask::titled("a")).unwrap();
        let b = repo.create(&NewTask::titled("b")).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn operations_fail_on_closed_store() {
        let repo = TaskRepository::new(Arc::new(LocalStore::default()));
        assert_matches!(
            repo.create(&NewTask::titled("x")),
            Err(TaskError::Store(StoreError::NotInitialized))
        );
        assert_matches!(repo.list(), Err(TaskError::Store(StoreError::NotInitialized)));
    }

    // ── update ─────────────────────────────────────────────────────────

    #[test]
    fn update_applies_only_present_fields() {
        let repo = setup();
        let task = repo
            .create(&NewTask {
                title: "Draft".into(),
                description: Some("first pass".into()),
                priority: Some(3),
                ..NewTask::default()
            })
            .unwrap();
        repo.mark_synced(&task.id).unwrap();

        let patch = TaskPatch {
            completed: Some(true),
            priority: Some(None),
            ..TaskPatch::default()
        };
        let updated = repo.update(&task.id, &patch).unwrap().unwrap();

        assert_eq!(updated.title, "Draft");
        assert_eq!(updated.description.as_deref(), Some("first pass"));
        assert!(updated.completed);
        assert_eq!(updated.priority, None);
        assert_eq!(updated.pending_op, Some(PendingOp::Update));
        assert!(updated.updated_at >= task.updated_at);
        assert_eq!(repo.get(&task.id).unwrap().unwrap(), updated);
    }

    #[test]
    fn update_overwrites_pending_create() {
        let repo = setup();
        let task = repo.create(&NewTask::titled("fresh")).unwrap();
        let updated = repo.update(&task.id, &TaskPatch::title("renamed")).unwrap().unwrap();
        assert_eq!(updated.pending_op, Some(PendingOp::Update));
    }

    #[test]
    fn update_unknown_id_is_noop() {
        let repo = setup();
        assert!(repo.update("task-missing", &TaskPatch::completed(true)).unwrap().is_none());
        assert_eq!(repo.pending_count().unwrap(), 0);
    }

    #[test]
    fn update_tombstoned_row_is_noop() {
        let repo = setup();
        let task = repo.create(&NewTask::titled("gone")).unwrap();
        repo.delete(&task.id).unwrap();
        assert!(repo.update(&task.id, &TaskPatch::title("back")).unwrap().is_none());
        let stored = repo.get(&task.id).unwrap().unwrap();
        assert_eq!(stored.pending_op, Some(PendingOp::Delete));
        assert_eq!(stored.title, "gone");
    }

    #[test]
    fn update_rejects_blank_title() {
        let repo = setup();
        let task = repo.create(&NewTask::titled("ok")).unwrap();
        assert_matches!(
            repo.update(&task.id, &TaskPatch::title("")),
            Err(TaskError::Validation(_))
        );
    }

    // ── delete ─────────────────────────────────────────────────────────

    #[test]
    fn delete_tombstones_and_is_idempotent() {
        let repo = setup();
        let task = repo.create(&NewTask::titled("temp")).unwrap();
        repo.mark_synced(&task.id).unwrap();

        assert_eq!(repo.delete(&task.id).unwrap(), 1);
        let stored = repo.get(&task.id).unwrap().unwrap();
        assert!(stored.deleted);
        assert_eq!(stored.pending_op, Some(PendingOp::Delete));

        assert_eq!(repo.delete(&task.id).unwrap(), 0);
        assert_eq!(repo.delete("task-never").unwrap(), 0);
    }

    #[test]
    fn rows_are_never_physically_removed() {
        let repo = setup();
        let task = repo.create(&NewTask::titled("keep me")).unwrap();
        repo.delete(&task.id).unwrap();
        repo.mark_synced(&task.id).unwrap();
        let stored = repo.get(&task.id).unwrap().unwrap();
        assert!(stored.deleted);
        assert!(!stored.is_dirty());
    }

    // ── lists ──────────────────────────────────────────────────────────

    #[test]
    fn list_excludes_tombstones() {
        let repo = setup();
        let keep = repo.create(&NewTask::titled("keep")).unwrap();
        let drop = repo.create(&NewTask::titled("drop")).unwrap();
        repo.delete(&drop.id).unwrap();

        let ids: Vec<TaskId> = repo.list().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![keep.id]);
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn list_all_includes_tombstones() {
        let repo = setup();
        let keep = repo.create(&NewTask::titled("keep")).unwrap();
        let gone = repo.create(&NewTask::titled("gone")).unwrap();
        repo.delete(&gone.id).unwrap();
        set_updated_at(&repo, &keep.id, 10);
        set_updated_at(&repo, &gone.id, 20);

        let all = repo.list_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, gone.id);
        assert!(all[0].deleted);
        assert!(!all[1].deleted);
    }

    #[test]
    fn list_orders_newest_first() {
        let repo = setup();
        let old = repo.create(&NewTask::titled("old")).unwrap();
        let new = repo.create(&NewTask::titled("new")).unwrap();
        set_updated_at(&repo, &old.id, 10);
        set_updated_at(&repo, &new.id, 20);
        let titles: Vec<String> = repo.list().unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, ["new", "old"]);
    }

    #[test]
    fn filtered_lists() {
        let repo = setup();
        let done = repo.create(&NewTask::titled("done")).unwrap();
        repo.update(&done.id, &TaskPatch::completed(true)).unwrap();
        let later = repo
            .create(&NewTask {
                title: "later".into(),
                action_category: ActionCategory::Defer,
                ..NewTask::default()
            })
            .unwrap();
        let gone = repo
            .create(&NewTask {
                title: "gone".into(),
                action_category: ActionCategory::Defer,
                ..NewTask::default()
            })
            .unwrap();
        repo.update(&gone.id, &TaskPatch::completed(true)).unwrap();
        repo.delete(&gone.id).unwrap();

        let completed = repo.list_by_completion(true).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, done.id);

        let open = repo.list_by_completion(false).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, later.id);

        let deferred = repo.list_by_category(ActionCategory::Defer).unwrap();
        assert_eq!(deferred.len(), 1);
        assert_eq!(deferred[0].id, later.id);
        assert!(repo.list_by_category(ActionCategory::Delegate).unwrap().is_empty());
    }

    #[test]
    fn list_dirty_orders_oldest_first() {
        let repo = setup();
        let a = repo.create(&NewTask::titled("A")).unwrap();
        let b = repo.create(&NewTask::titled("B")).unwrap();
        let clean = repo.create(&NewTask::titled("clean")).unwrap();
        set_updated_at(&repo, &a.id, 100);
        set_updated_at(&repo, &b.id, 50);
        repo.mark_synced(&clean.id).unwrap();

        let ids: Vec<TaskId> = repo.list_dirty().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
        assert_eq!(repo.pending_count().unwrap(), 2);
    }

    #[test]
    fn list_dirty_includes_tombstones() {
        let repo = setup();
        let task = repo.create(&NewTask::titled("x")).unwrap();
        repo.delete(&task.id).unwrap();
        let dirty = repo.list_dirty().unwrap();
        assert_eq!(dirty.len(), 1);
        assert!(dirty[0].deleted);
    }

    // ── sync bookkeeping ───────────────────────────────────────────────

    #[test]
    fn mark_synced_is_idempotent() {
        let repo = setup();
        let task = repo.create(&NewTask::titled("x")).unwrap();
        for _ in 0..2 {
            assert_eq!(repo.mark_synced(&task.id).unwrap(), 1);
            let stored = repo.get(&task.id).unwrap().unwrap();
            assert_eq!(stored.pending_op, None);
        }
        assert_eq!(inconsistent_rows(&repo), 0);
    }

    #[test]
    fn mark_synced_if_unchanged_keeps_newer_mutation() {
        let repo = setup();
        let task = repo.create(&NewTask::titled("x")).unwrap();
        set_updated_at(&repo, &task.id, 1);
        let seen = repo.get(&task.id).unwrap().unwrap();

        // A local edit lands while the push for `seen` is in flight.
        repo.update(&task.id, &TaskPatch::title("edited")).unwrap();

        assert_eq!(repo.mark_synced_if_unchanged(&task.id, seen.updated_at).unwrap(), 0);
        let stored = repo.get(&task.id).unwrap().unwrap();
        assert_eq!(stored.pending_op, Some(PendingOp::Update));

        assert_eq!(
            repo.mark_synced_if_unchanged(&task.id, stored.updated_at).unwrap(),
            1
        );
    }

    #[test]
    fn upsert_inserts_clean_row() {
        let repo = setup();
        let mut incoming = remote("srv-1", "From server");
        incoming.updated_at = Some(500);
        let task = repo.upsert_from_server(&incoming).unwrap();
        assert_eq!(task.id.as_str(), "srv-1");
        assert_eq!(task.updated_at, 500);
        assert!(!task.is_dirty());
        assert!(!task.deleted);
        assert_eq!(repo.pending_count().unwrap(), 0);
    }

    #[test]
    fn upsert_overwrites_local_edits_and_tombstone() {
        let repo = setup();
        let local = repo.create(&NewTask::titled("local")).unwrap();
        repo.delete(&local.id).unwrap();

        let mut incoming = remote(&local.id, "server title");
        incoming.completed = true;
        incoming.action_category = ActionCategory::Defer;
        let task = repo.upsert_from_server(&incoming).unwrap();

        assert_eq!(task.title, "server title");
        assert!(task.completed);
        assert_eq!(task.action_category, ActionCategory::Defer);
        assert!(!task.deleted);
        assert_eq!(task.pending_op, None);
    }

    #[test]
    fn upsert_is_idempotent() {
        let repo = setup();
        let incoming = remote("srv-2", "twice");
        let once = repo.upsert_from_server(&incoming).unwrap();
        let twice = repo.upsert_from_server(&incoming).unwrap();
        assert_eq!(once, twice);
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn upsert_accepts_blank_server_title() {
        let repo = setup();
        let task = repo.upsert_from_server(&remote("srv-3", "")).unwrap();
        assert_eq!(task.title, "");
        assert!(!task.is_dirty());
    }

    #[test]
    fn adopt_remote_id_rekeys_row() {
        let repo = setup();
        let task = repo.create(&NewTask::titled("x")).unwrap();
        assert!(repo.adopt_remote_id(&task.id, "srv-9").unwrap());
        assert!(repo.get(&task.id).unwrap().is_none());
        let moved = repo.get("srv-9").unwrap().unwrap();
        assert_eq!(moved.title, "x");
        assert_eq!(moved.pending_op, Some(PendingOp::Create));
    }

    #[test]
    fn adopt_remote_id_same_or_unknown() {
        let repo = setup();
        let task = repo.create(&NewTask::titled("x")).unwrap();
        assert!(!repo.adopt_remote_id(&task.id, &task.id).unwrap());
        assert!(!repo.adopt_remote_id("task-none", "srv-1").unwrap());
    }

    #[test]
    fn adopt_remote_id_conflict() {
        let repo = setup();
        let task = repo.create(&NewTask::titled("x")).unwrap();
        repo.upsert_from_server(&remote("srv-1", "pulled")).unwrap();
        assert_matches!(
            repo.adopt_remote_id(&task.id, "srv-1"),
            Err(TaskError::Conflict(_))
        );
        assert!(repo.get(&task.id).unwrap().is_some());
    }

    #[test]
    fn inconsistent_row_is_rejected_on_read() {
        let repo = setup();
        let task = repo.create(&NewTask::titled("x")).unwrap();
        repo.store()
            .execute("UPDATE tasks SET dirty = 0 WHERE id = ?1", params![task.id])
            .unwrap();
        assert_matches!(repo.get(&task.id), Err(TaskError::Store(StoreError::Sqlite(_))));
    }

    #[test]
    fn unknown_category_is_rejected_on_read() {
        let repo = setup();
        let task = repo.create(&NewTask::titled("x")).unwrap();
        repo.store()
            .execute(
                "UPDATE tasks SET action_category = 9 WHERE id = ?1",
                params![task.id],
            )
            .unwrap();
        assert!(repo.get(&task.id).is_err());
    }

    // ── invariants ─────────────────────────────────────────────────────

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Step {
            Create,
            Update(usize),
            Complete(usize),
            Delete(usize),
            MarkSynced(usize),
            Upsert(usize),
        }

        fn step() -> impl Strategy<Value = Step> {
            prop_oneof![
                Just(Step::Create),
                (0usize..8).prop_map(Step::Update),
                (0usize..8).prop_map(Step::Complete),
                (0usize..8).prop_map(Step::Delete),
                (0usize..8).prop_map(Step::MarkSynced),
                (0usize..8).prop_map(Step::Upsert),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn dirty_iff_op_and_lists_hide_tombstones(steps in prop::collection::vec(step(), 1..40)) {
                let repo = setup();
                let mut ids: Vec<TaskId> = Vec::new();
                let pick = |ids: &Vec<TaskId>, i: usize| ids.get(i % ids.len().max(1)).cloned();

                for step in steps {
                    match step {
                        Step::Create => {
                            let task = repo.create(&NewTask::titled("t")).unwrap();
                            prop_assert_eq!(task.pending_op, Some(PendingOp::Create));
                            ids.push(task.id);
                        }
                        Step::Update(i) => if let Some(id) = pick(&ids, i) {
                            repo.update(&id, &TaskPatch::title("u")).unwrap();
                        },
                        Step::Complete(i) => if let Some(id) = pick(&ids, i) {
                            repo.update(&id, &TaskPatch::completed(true)).unwrap();
                        },
                        Step::Delete(i) => if let Some(id) = pick(&ids, i) {
                            let before = repo.get(&id).unwrap().unwrap();
                            let changed = repo.delete(&id).unwrap();
                            prop_assert_eq!(changed, usize::from(!before.deleted));
                        },
                        Step::MarkSynced(i) => if let Some(id) = pick(&ids, i) {
                            repo.mark_synced(&id).unwrap();
                        },
                        Step::Upsert(i) => if let Some(id) = pick(&ids, i) {
                            let task = repo.upsert_from_server(&remote(&id, "srv")).unwrap();
                            prop_assert!(!task.is_dirty() && !task.deleted);
                        },
                    }

                    prop_assert_eq!(inconsistent_rows(&repo), 0);
                    prop_assert!(repo.list().unwrap().iter().all(|t| !t.deleted));
                    prop_assert!(repo.list_dirty().unwrap().iter().all(Task::is_dirty));
                }
            }
        }
    }
}
