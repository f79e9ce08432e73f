//! Soft delete, restore, and permanent delete.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::{Gateway, GatewayError};
use crate::board::{Column, ColumnRole, Task, TaskPatch, Tombstone};
use crate::store::Action;
use crate::wip;

impl Gateway {
    /// Move a task to the trash. Undoable.
    pub async fn delete_task(&mut self, task_id: &str) -> Result<(), GatewayError> {
        if let Err(e) = self.active_task(task_id) {
            return Err(self.report(e));
        }
        let stone = Tombstone {
            deleted_at: Utc::now(),
            deleted_by: self.user_id.clone(),
        };
        self.store.dispatch(Action::PushHistory);
        self.store.dispatch(Action::SoftDeleteTask {
            task_id: task_id.to_string(),
            deleted_by: stone.deleted_by.clone(),
            deleted_at: stone.deleted_at,
        });

        let patch = TaskPatch {
            tombstone: Some(Some(stone)),
            ..Default::default()
        };
        match self.remote.update_task(task_id, &patch).await {
            Ok(_) => {
                info!(task = %task_id, "task moved to trash");
                Ok(())
            }
            Err(e) => Err(self.recover(e).await),
        }
    }

    pub(super) fn trashed_task(&self, task_id: &str) -> Result<Task, GatewayError> {
        self.state()
            .trashed_tasks()
            .into_iter()
            .find(|t| t.id == task_id)
            .cloned()
            .ok_or_else(|| GatewayError::TaskNotFound(task_id.to_string()))
    }

    /// Column a restored task lands in: its own if it still exists, else
    /// the "to do" column.
    fn restore_target(&self, task: &Task) -> Result<Column, GatewayError> {
        let state = self.state();
        state
            .column(&task.column_id)
            .or_else(|| state.column_by_role(ColumnRole::Backlog))
            .cloned()
            .ok_or_else(|| {
                GatewayError::precondition(format!("no column to restore '{}' into", task.title))
            })
    }

    /// Take a task out of the trash. The target column's WIP limit applies.
    pub async fn restore_task(&mut self, task_id: &str) -> Result<(), GatewayError> {
        let found = self
            .trashed_task(task_id)
            .and_then(|task| Ok((self.restore_target(&task)?, task)));
        let (column, task) = match found {
            Ok(found) => found,
            Err(e) => return Err(self.report(e)),
        };
        if let Err(v) = wip::check_capacity(&column, &self.state().tasks, 1) {
            return Err(self.report(v.into()));
        }

        let mut patch = TaskPatch {
            tombstone: Some(None),
            ..Default::default()
        };
        if column.id != task.column_id {
            let position = self.end_position(&column.id, None);
            patch.column_id = match self.owner_column(&task, &column.id).await {
                Ok(id) => Some(id),
                Err(e) => return Err(self.report(e)),
            };
            patch.position = Some(position);
            self.store.dispatch(Action::RestoreTask(task_id.to_string()));
            self.store.dispatch(Action::MoveTask {
                task_id: task_id.to_string(),
                column_id: column.id.clone(),
                position,
            });
        } else {
            self.store.dispatch(Action::RestoreTask(task_id.to_string()));
        }

        match self.remote.update_task(task_id, &patch).await {
            Ok(_) => {
                info!(task = %task_id, column = %column.id, "task restored");
                Ok(())
            }
            Err(e) => Err(self.recover(e).await),
        }
    }

    /// Irreversibly delete a task, live or trashed. Not undoable.
    pub async fn permanently_delete_task(&mut self, task_id: &str) -> Result<(), GatewayError> {
        let known = self.state().task(task_id).is_some()
            || self.state().trash.iter().any(|t| t.id == task_id);
        if !known {
            return Err(self.report(GatewayError::TaskNotFound(task_id.to_string())));
        }
        self.store.dispatch(Action::DeleteTask(task_id.to_string()));

        match self.remote.delete_task(task_id).await {
            Ok(()) => {
                info!(task = %task_id, "task permanently deleted");
                Ok(())
            }
            Err(e) => Err(self.recover(e).await),
        }
    }

    /// Trashed tasks deleted at least the retention period before `now`.
    /// A retention of zero days disables purging.
    pub fn expired_trash(&self, now: DateTime<Utc>) -> Vec<String> {
        if self.config.trash_retention_days == 0 {
            return Vec::new();
        }
        let cutoff = now - Duration::days(i64::from(self.config.trash_retention_days));
        self.state()
            .trashed_tasks()
            .into_iter()
            .filter(|t| t.tombstone.as_ref().is_some_and(|s| s.deleted_at <= cutoff))
            .map(|t| t.id.clone())
            .collect()
    }

    /// Permanently delete expired trash. Returns how many were removed.
    pub async fn purge_trash(&mut self, now: DateTime<Utc>) -> Result<usize, GatewayError> {
        let expired = self.expired_trash(now);
        if expired.is_empty() {
            return Ok(0);
        }
        self.bulk_permanent_delete(&expired).await
    }
}
