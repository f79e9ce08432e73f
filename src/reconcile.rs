//! Cross-board reconciliation.
//!
//! Builds the visible task set for the current user: the board's own tasks
//! plus tasks from other boards the user is assigned to. Foreign tasks are
//! remapped in memory onto the equivalent column of the current board;
//! own tasks pointing at a column the board does not have are repaired on
//! the remote.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::board::{Board, Column, ColumnRole, Task, TaskPatch};
use crate::remote::{Remote, RemoteResult};

/// Why a task could not be placed on the current board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GapReason {
    /// Foreign task whose column has no title or role match and the board
    /// has no "to do" column to fall back to.
    NoEquivalentColumn { original_title: Option<String> },
    /// Own task on an unknown column and no "to do" column to repair to.
    NoRepairTarget { column_id: String },
    /// Own task shown in "to do" whose repair write failed; the remote
    /// still has the unknown column.
    RepairFailed { column_id: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileGap {
    pub task_id: String,
    pub task_title: String,
    pub reason: GapReason,
}

impl std::fmt::Display for ReconcileGap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            GapReason::NoEquivalentColumn { original_title } => write!(
                f,
                "'{}' has no matching column here (was in '{}')",
                self.task_title,
                original_title.as_deref().unwrap_or("unknown column")
            ),
            GapReason::NoRepairTarget { column_id } => write!(
                f,
                "'{}' is on unknown column {} and there is no To Do column to move it to",
                self.task_title, column_id
            ),
            GapReason::RepairFailed { column_id, error } => write!(
                f,
                "'{}' could not be moved off unknown column {}: {}",
                self.task_title, column_id, error
            ),
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Default)]
pub struct Reconciled {
    /// Visible tasks, own first then remapped foreign ones.
    pub tasks: Vec<Task>,
    /// Own tombstoned tasks.
    pub trash: Vec<Task>,
    /// Ids of own tasks whose column was repaired on the remote.
    pub repaired: Vec<String>,
    pub gaps: Vec<ReconcileGap>,
}

/// Find the column on `columns` equivalent to `original`: title match, then
/// role match, then the "to do" column.
pub fn equivalent_column<'a>(columns: &'a [Column], original: Option<&Column>) -> Option<&'a Column> {
    if let Some(original) = original {
        if let Some(col) = columns.iter().find(|c| c.title_matches(&original.title)) {
            return Some(col);
        }
        if original.role != ColumnRole::Custom {
            if let Some(col) = columns.iter().find(|c| c.role == original.role) {
                return Some(col);
            }
        }
    }
    backlog(columns)
}

fn backlog(columns: &[Column]) -> Option<&Column> {
    columns.iter().find(|c| c.role == ColumnRole::Backlog)
}

pub async fn reconcile(
    remote: &dyn Remote,
    board: &Board,
    columns: &[Column],
    user_id: &str,
) -> RemoteResult<Reconciled> {
    let own = remote.list_tasks_by_board(&board.id).await?;
    let assigned = remote.list_tasks_by_assignee(user_id).await?;

    let known_columns: HashSet<&str> = columns.iter().map(|c| c.id.as_str()).collect();
    let mut out = Reconciled::default();

    let mut seen: HashSet<String> = HashSet::new();
    for mut task in own {
        seen.insert(task.id.clone());
        if task.is_deleted() {
            out.trash.push(task);
            continue;
        }
        if known_columns.contains(task.column_id.as_str()) {
            out.tasks.push(task);
            continue;
        }
        let Some(target) = backlog(columns) else {
            warn!(task = %task.id, column = %task.column_id, "task on unknown column, no repair target");
            out.gaps.push(ReconcileGap {
                task_id: task.id.clone(),
                task_title: task.title.clone(),
                reason: GapReason::NoRepairTarget {
                    column_id: task.column_id.clone(),
                },
            });
            continue;
        };
        let patch = TaskPatch {
            column_id: Some(target.id.clone()),
            ..Default::default()
        };
        match remote.update_task(&task.id, &patch).await {
            Ok(_) => {
                info!(task = %task.id, column = %target.id, "repaired task column");
                out.repaired.push(task.id.clone());
            }
            Err(e) => {
                warn!(task = %task.id, error = %e, "column repair failed, showing in To Do anyway");
                out.gaps.push(ReconcileGap {
                    task_id: task.id.clone(),
                    task_title: task.title.clone(),
                    reason: GapReason::RepairFailed {
                        column_id: task.column_id.clone(),
                        error: e.to_string(),
                    },
                });
            }
        }
        task.apply_patch(&patch);
        out.tasks.push(task);
    }

    let mut original_columns: HashMap<String, Option<Column>> = HashMap::new();
    for mut task in assigned {
        if task.is_deleted() || !seen.insert(task.id.clone()) {
            continue;
        }
        if !original_columns.contains_key(&task.column_id) {
            let looked_up = match remote.get_column(&task.column_id).await {
                Ok(col) => col,
                Err(e) => {
                    warn!(column = %task.column_id, error = %e, "column lookup failed");
                    None
                }
            };
            original_columns.insert(task.column_id.clone(), looked_up);
        }
        let original = original_columns.get(&task.column_id).and_then(Option::as_ref);
        match equivalent_column(columns, original) {
            Some(col) => {
                task.column_id = col.id.clone();
                out.tasks.push(task);
            }
            None => {
                warn!(task = %task.id, "assigned task has no equivalent column");
                out.gaps.push(ReconcileGap {
                    task_id: task.id.clone(),
                    task_title: task.title.clone(),
                    reason: GapReason::NoEquivalentColumn {
                        original_title: original.map(|c| c.title.clone()),
                    },
                });
            }
        }
    }

    info!(
        visible = out.tasks.len(),
        trashed = out.trash.len(),
        repaired = out.repaired.len(),
        gaps = out.gaps.len(),
        "reconciled tasks"
    );
    Ok(out)
}
