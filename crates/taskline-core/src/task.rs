//! Task model.
//!
//! [`Task`] mirrors one row of the `tasks` table. The dirty bit and the pending
//! operation are folded into a single `pending_op: Option<PendingOp>` so a row
//! can never be dirty without an op (or carry an op while clean).
//!
//! [`ActionCategory`] and [`PendingOp`] implement `rusqlite`'s `ToSql`/`FromSql`
//! so values are validated when they cross the store boundary. An unknown
//! stored value is a decode error.

use std::fmt;
use std::str::FromStr;

use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::TaskId;

/// Error returned when a string does not name a known enum variant.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// ActionCategory
// ─────────────────────────────────────────────────────────────────────────────

/// What the user intends to do with a task. Stored as an INTEGER.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    /// Do it now.
    #[default]
    Do,
    /// Do it later.
    Defer,
    /// Hand it to someone else.
    Delegate,
}

impl ActionCategory {
    /// Every variant, in storage order.
    pub const ALL: [Self; 3] = [Self::Do, Self::Defer, Self::Delegate];

    /// Integer stored in the `action_category` column.
    pub fn as_sql(self) -> i64 {
        match self {
            Self::Do => 0,
            Self::Defer => 1,
            Self::Delegate => 2,
        }
    }

    /// Decode the `action_category` column.
    pub fn from_sql(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Do),
            1 => Some(Self::Defer),
            2 => Some(Self::Delegate),
            _ => None,
        }
    }

    /// Lowercase name, as used on the wire and in the CLI.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Do => "do",
            Self::Defer => "defer",
            Self::Delegate => "delegate",
        }
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError {
                kind: "action category",
                value: s.to_string(),
            })
    }
}

impl ToSql for ActionCategory {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_sql()))
    }
}

impl FromSql for ActionCategory {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = i64::column_result(value)?;
        Self::from_sql(raw).ok_or(FromSqlError::OutOfRange(raw))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PendingOp
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of local mutation waiting to be pushed. Stored as TEXT in `op`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingOp {
    /// Row was created locally and the remote side has not seen it.
    Create,
    /// Row was edited locally.
    Update,
    /// Row was tombstoned locally.
    Delete,
}

impl PendingOp {
    /// Text stored in the `op` column.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Decode the `op` column.
    pub fn from_sql(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for PendingOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl ToSql for PendingOp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_sql()))
    }
}

impl FromSql for PendingOp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        Self::from_sql(raw).ok_or_else(|| {
            FromSqlError::Other(Box::new(ParseEnumError {
                kind: "pending op",
                value: raw.to_string(),
            }))
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────────────────

/// One task row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Row identity.
    pub id: TaskId,
    /// Required title.
    pub title: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Whether the task is done.
    pub completed: bool,
    /// Do / defer / delegate.
    pub action_category: ActionCategory,
    /// Optional ordinal priority.
    pub priority: Option<i64>,
    /// Opaque reference to an external goal.
    pub goal_ref: Option<String>,
    /// Milliseconds since epoch of the last local mutation.
    pub updated_at: i64,
    /// Tombstone bit.
    pub deleted: bool,
    /// Unconfirmed local mutation, if any. `Some` iff the row is dirty.
    pub pending_op: Option<PendingOp>,
}

impl Task {
    /// Whether the row has a local mutation not yet confirmed remotely.
    pub fn is_dirty(&self) -> bool {
        self.pending_op.is_some()
    }

    /// Payload sent to the remote side for this row.
    pub fn fields(&self) -> TaskFields {
        TaskFields::from(self)
    }
}

/// Input for creating a task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    /// Required title (must not be blank).
    pub title: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Category; defaults to [`ActionCategory::Do`].
    #[serde(default)]
    pub action_category: ActionCategory,
    /// Optional priority.
    #[serde(default)]
    pub priority: Option<i64>,
    /// Optional goal reference.
    #[serde(default)]
    pub goal_ref: Option<String>,
}

impl NewTask {
    /// A `do` task with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update of a task's user-editable fields.
///
/// `None` leaves a field untouched. Nullable columns use `Option<Option<_>>`:
/// `Some(None)` clears the column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// New title.
    pub title: Option<String>,
    /// New description, or `Some(None)` to clear.
    pub description: Option<Option<String>>,
    /// New completion state.
    pub completed: Option<bool>,
    /// New category.
    pub action_category: Option<ActionCategory>,
    /// New priority, or `Some(None)` to clear.
    pub priority: Option<Option<i64>>,
    /// New goal reference, or `Some(None)` to clear.
    pub goal_ref: Option<Option<String>>,
}

impl TaskPatch {
    /// Patch that only flips the completion flag.
    pub fn completed(flag: bool) -> Self {
        Self {
            completed: Some(flag),
            ..Self::default()
        }
    }

    /// Patch that only renames the task.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Copy every present field onto `task`. Bookkeeping columns are untouched.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            task.description.clone_from(description);
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(category) = self.action_category {
            task.action_category = category;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(goal_ref) = &self.goal_ref {
            task.goal_ref.clone_from(goal_ref);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Remote wire shapes
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable fields pushed to the remote side on create and update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFields {
    /// Local id, sent so the remote side may keep it.
    pub client_id: TaskId,
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Completion flag.
    pub completed: bool,
    /// Category.
    pub action_category: ActionCategory,
    /// Priority.
    pub priority: Option<i64>,
    /// Goal reference.
    pub goal_ref: Option<String>,
}

impl From<&Task> for TaskFields {
    fn from(task: &Task) -> Self {
        Self {
            client_id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            completed: task.completed,
            action_category: task.action_category,
            priority: task.priority,
            goal_ref: task.goal_ref.clone(),
        }
    }
}

/// A task as the remote system of record returns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTask {
    /// Remote identity.
    pub id: TaskId,
    /// Title.
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Completion flag.
    #[serde(default)]
    pub completed: bool,
    /// Category.
    #[serde(default)]
    pub action_category: ActionCategory,
    /// Priority.
    #[serde(default)]
    pub priority: Option<i64>,
    /// Goal reference.
    #[serde(default)]
    pub goal_ref: Option<String>,
    /// Remote modification time in milliseconds, when the server reports one.
    #[serde(default)]
    pub updated_at: Option<i64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sample() -> Task {
        Task {
            id: TaskId::from("task-1"),
            title: "Write report".into(),
            description: Some("quarterly".into()),
            completed: false,
            action_category: ActionCategory::Defer,
            priority: Some(2),
            goal_ref: None,
            updated_at: 100,
            deleted: false,
            pending_op: Some(PendingOp::Create),
        }
    }

    #[test]
    fn action_category_sql_codes() {
        for category in ActionCategory::ALL {
            assert_eq!(ActionCategory::from_sql(category.as_sql()), Some(category));
        }
        assert_eq!(ActionCategory::Do.as_sql(), 0);
        assert_eq!(ActionCategory::Delegate.as_sql(), 2);
        assert_eq!(ActionCategory::from_sql(3), None);
    }

    #[test]
    fn action_category_parses_case_insensitively() {
        assert_eq!("Defer".parse::<ActionCategory>(), Ok(ActionCategory::Defer));
        let err = "later".parse::<ActionCategory>().unwrap_err();
        assert_eq!(err.to_string(), "unknown action category: \"later\"");
    }

    #[test]
    fn pending_op_text_codes() {
        assert_eq!(PendingOp::from_sql("delete"), Some(PendingOp::Delete));
        assert_eq!(PendingOp::Update.as_sql(), "update");
        assert_eq!(PendingOp::from_sql("UPDATE"), None);
    }

    #[test]
    fn store_boundary_rejects_unknown_values() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let bad_category = conn.query_row("SELECT 7", [], |row| row.get::<_, ActionCategory>(0));
        assert_matches!(
            bad_category,
            Err(rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::IntegralValueOutOfRange(..))
        );
        let bad_op = conn.query_row("SELECT 'upsert'", [], |row| row.get::<_, PendingOp>(0));
        assert!(bad_op.is_err());
        let good: PendingOp = conn
            .query_row("SELECT ?1", [PendingOp::Create], |row| row.get(0))
            .unwrap();
        assert_eq!(good, PendingOp::Create);
    }

    #[test]
    fn dirty_follows_pending_op() {
        let mut task = sample();
        assert!(task.is_dirty());
        task.pending_op = None;
        assert!(!task.is_dirty());
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let mut task = sample();
        let patch = TaskPatch {
            description: Some(None),
            priority: Some(Some(9)),
            ..TaskPatch::completed(true)
        };
        patch.apply_to(&mut task);
        assert!(task.completed);
        assert_eq!(task.description, None);
        assert_eq!(task.priority, Some(9));
        assert_eq!(task.title, "Write report");
        assert_eq!(task.action_category, ActionCategory::Defer);
    }

    #[test]
    fn empty_patch() {
        assert!(TaskPatch::default().is_empty());
        assert!(!TaskPatch::title("x").is_empty());
    }

    #[test]
    fn fields_carry_client_id() {
        let fields = sample().fields();
        assert_eq!(fields.client_id.as_str(), "task-1");
        assert_eq!(fields.priority, Some(2));
    }

    #[test]
    fn remote_task_defaults_missing_fields() {
        let remote: RemoteTask =
            serde_json::from_str(r#"{"id":"srv-1","title":"From server"}"#).unwrap();
        assert_eq!(remote.action_category, ActionCategory::Do);
        assert!(!remote.completed);
        assert_eq!(remote.updated_at, None);
    }

    #[test]
    fn task_serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["actionCategory"], "defer");
        assert_eq!(json["pendingOp"], "create");
        assert_eq!(json["updatedAt"], 100);
    }
}
