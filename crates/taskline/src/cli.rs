//! Command-line surface.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use taskline_core::{ActionCategory, NewTask, TaskPatch};
use taskline_store::{LocalStore, get_version, latest_version};
use taskline_tasks::TaskRepository;

/// Inspect and edit the local Taskline task store.
#[derive(Parser, Debug)]
#[command(name = "taskline", version, about = "Inspect and edit the local Taskline task store")]
pub struct Cli {
    /// Database file (`:memory:` for a scratch store). Overrides settings.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Log filter level, e.g. `debug`. `RUST_LOG` still wins.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands. Each prints one JSON document on stdout.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Create a task.
    Add {
        /// Task title.
        title: String,
        /// Free-form description.
        #[arg(long)]
        description: Option<String>,
        /// do, defer or delegate.
        #[arg(long)]
        category: Option<ActionCategory>,
        /// Priority; lower is more urgent.
        #[arg(long)]
        priority: Option<i64>,
        /// Goal reference.
        #[arg(long)]
        goal: Option<String>,
    },
    /// List live tasks, newest change first.
    List {
        /// Only tasks with this completion state.
        #[arg(long)]
        completed: Option<bool>,
        /// Only tasks in this category.
        #[arg(long)]
        category: Option<ActionCategory>,
        /// Include deleted tasks; ignores the filters.
        #[arg(long, conflicts_with_all = ["completed", "category"])]
        all: bool,
    },
    /// Show one task, deleted or not.
    Show {
        /// Task id.
        id: String,
    },
    /// Mark a task completed.
    Complete {
        /// Task id.
        id: String,
    },
    /// Change a task's fields.
    Edit {
        /// Task id.
        id: String,
        /// New title.
        #[arg(long)]
        title: Option<String>,
        /// New description.
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        /// Remove the description.
        #[arg(long)]
        clear_description: bool,
        /// New category.
        #[arg(long)]
        category: Option<ActionCategory>,
        /// New priority.
        #[arg(long, conflicts_with = "clear_priority")]
        priority: Option<i64>,
        /// Remove the priority.
        #[arg(long)]
        clear_priority: bool,
        /// New goal reference.
        #[arg(long, conflicts_with = "clear_goal")]
        goal: Option<String>,
        /// Remove the goal reference.
        #[arg(long)]
        clear_goal: bool,
        /// Set the completion state; `false` reopens a task.
        #[arg(long)]
        completed: Option<bool>,
    },
    /// Delete a task (kept as a tombstone until synced).
    Rm {
        /// Task id.
        id: String,
    },
    /// Tasks waiting to be pushed, in push queue order.
    Pending,
    /// Stored and latest schema version.
    SchemaVersion,
}

impl Command {
    /// Execute against `repo` and return the JSON to print.
    pub fn run(self, repo: &TaskRepository) -> Result<Value> {
        match self {
            Self::Add {
                title,
                description,
                category,
                priority,
                goal,
            } => {
                let task = repo.create(&NewTask {
                    title,
                    description,
                    action_category: category.unwrap_or_default(),
                    priority,
                    goal_ref: goal,
                })?;
                Ok(serde_json::to_value(task)?)
            }
            Self::List {
                completed,
                category,
                all,
            } => {
                let tasks = if all {
                    repo.list_all()?
                } else {
                    match (completed, category) {
                        (None, None) => repo.list()?,
                        (Some(flag), None) => repo.list_by_completion(flag)?,
                        (flag, Some(category)) => repo
                            .list_by_category(category)?
                            .into_iter()
                            .filter(|t| flag.is_none_or(|f| t.completed == f))
                            .collect(),
                    }
                };
                Ok(serde_json::to_value(tasks)?)
            }
            Self::Show { id } => {
                let task = repo.get(&id)?.ok_or_else(|| not_found(&id))?;
                Ok(serde_json::to_value(task)?)
            }
            Self::Complete { id } => {
                let task = repo
                    .update(&id, &TaskPatch::completed(true))?
                    .ok_or_else(|| not_found(&id))?;
                Ok(serde_json::to_value(task)?)
            }
            Self::Edit {
                id,
                title,
                description,
                clear_description,
                category,
                priority,
                clear_priority,
                goal,
                clear_goal,
                completed,
            } => {
                let patch = TaskPatch {
                    title,
                    description: set_or_clear(description, clear_description),
                    completed,
                    action_category: category,
                    priority: set_or_clear(priority, clear_priority),
                    goal_ref: set_or_clear(goal, clear_goal),
                };
                if patch.is_empty() {
                    return Err(anyhow!("nothing to change"));
                }
                let task = repo.update(&id, &patch)?.ok_or_else(|| not_found(&id))?;
                Ok(serde_json::to_value(task)?)
            }
            Self::Rm { id } => {
                let deleted = repo.delete(&id)?;
                Ok(json!({ "id": id, "deleted": deleted }))
            }
            Self::Pending => Ok(serde_json::to_value(repo.list_dirty()?)?),
            Self::SchemaVersion => Ok(schema_version(repo.store())?),
        }
    }
}

fn schema_version(store: &LocalStore) -> Result<Value> {
    Ok(json!({
        "version": get_version(store)?,
        "latest": latest_version(),
    }))
}

/// Map a `--x`/`--clear-x` flag pair onto a nullable patch field.
fn set_or_clear<T>(value: Option<T>, clear: bool) -> Option<Option<T>> {
    if clear { Some(None) } else { value.map(Some) }
}

fn not_found(id: &str) -> anyhow::Error {
    anyhow!("task {id} not found")
}
