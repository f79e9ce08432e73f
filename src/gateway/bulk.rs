//! Bulk variants over the selection (or explicit ids for trash).
//!
//! Each item's remote call is independent and nothing is rolled back. After
//! the batch the selection is cleared and tasks are reloaded so the store
//! reflects exactly which writes landed.

use chrono::Utc;
use tracing::{info, warn};

use super::{Gateway, GatewayError};
use crate::board::{Priority, TaskPatch, Tombstone};
use crate::store::Action;
use crate::wip;

impl Gateway {
    /// Report the batch outcome, clear the selection, and reload.
    async fn finish_bulk(&mut self, verb: &str, attempted: usize, succeeded: usize) -> Result<usize, GatewayError> {
        self.store.dispatch(Action::ClearSelection);
        let _ = self.load_tasks().await;
        let failed = attempted - succeeded;
        if failed == 0 {
            info!(count = succeeded, "bulk {verb}");
            self.notices.info(format!("{succeeded} of {attempted} tasks {verb}"));
            return Ok(succeeded);
        }
        warn!(succeeded, failed, "bulk {verb} partially failed");
        self.notices.warn(format!("{succeeded} of {attempted} tasks {verb}"));
        Err(GatewayError::Partial {
            succeeded,
            failed,
            attempted,
        })
    }

    fn selection_or_err(&mut self) -> Result<Vec<String>, GatewayError> {
        let ids = self.selected_ids();
        if ids.is_empty() {
            return Err(self.report(GatewayError::precondition("no tasks selected")));
        }
        Ok(ids)
    }

    /// Soft-delete every selected task. One history entry covers the batch.
    pub async fn bulk_delete(&mut self) -> Result<usize, GatewayError> {
        let ids = self.selection_or_err()?;
        let stone = Tombstone {
            deleted_at: Utc::now(),
            deleted_by: self.user_id.clone(),
        };
        self.store.dispatch(Action::PushHistory);
        for id in &ids {
            self.store.dispatch(Action::SoftDeleteTask {
                task_id: id.clone(),
                deleted_by: stone.deleted_by.clone(),
                deleted_at: stone.deleted_at,
            });
        }

        let patch = TaskPatch {
            tombstone: Some(Some(stone)),
            ..Default::default()
        };
        let mut succeeded = 0;
        for id in &ids {
            match self.remote.update_task(id, &patch).await {
                Ok(_) => succeeded += 1,
                Err(e) => warn!(task = %id, error = %e, "bulk delete item failed"),
            }
        }
        self.finish_bulk("deleted", ids.len(), succeeded).await
    }

    /// Move every selected task to the end of `column_id`. Rejected as a
    /// whole when the batch does not fit under the column's WIP limit.
    pub async fn bulk_move(&mut self, column_id: &str) -> Result<usize, GatewayError> {
        let ids = self.selection_or_err()?;
        let column = match self.column(column_id) {
            Ok(column) => column,
            Err(e) => return Err(self.report(e)),
        };
        if let Err(v) = wip::check_bulk_move(&column, &self.state().tasks, ids.iter().map(String::as_str)) {
            return Err(self.report(v.into()));
        }

        let movers: Vec<_> = ids
            .iter()
            .filter_map(|id| self.state().task(id))
            .filter(|t| t.column_id != column_id && !t.is_deleted())
            .cloned()
            .collect();
        let mut targets = Vec::with_capacity(movers.len());
        for task in &movers {
            match self.owner_column(task, column_id).await {
                Ok(remote_column) => targets.push(remote_column),
                Err(e) => return Err(self.report(e)),
            }
        }

        self.store.dispatch(Action::PushHistory);
        let mut position = self.end_position(column_id, None);
        let mut moves = Vec::with_capacity(movers.len());
        for (task, remote_column) in movers.iter().zip(targets) {
            self.store.dispatch(Action::MoveTask {
                task_id: task.id.clone(),
                column_id: column_id.to_string(),
                position,
            });
            moves.push((task.id.clone(), TaskPatch::moved(&remote_column, position)));
            position += 1;
        }

        let mut succeeded = 0;
        for (id, patch) in &moves {
            match self.remote.update_task(id, patch).await {
                Ok(_) => succeeded += 1,
                Err(e) => warn!(task = %id, error = %e, "bulk move item failed"),
            }
        }
        self.finish_bulk("moved", moves.len(), succeeded).await
    }

    pub async fn bulk_set_priority(&mut self, priority: Priority) -> Result<usize, GatewayError> {
        let ids = self.selection_or_err()?;
        self.store.dispatch(Action::PushHistory);
        let patch = TaskPatch {
            priority: Some(priority),
            ..Default::default()
        };
        for id in &ids {
            if let Some(mut task) = self.state().task(id).cloned() {
                task.apply_patch(&patch);
                self.store.dispatch(Action::UpdateTask(task));
            }
        }

        let mut succeeded = 0;
        for id in &ids {
            match self.remote.update_task(id, &patch).await {
                Ok(_) => succeeded += 1,
                Err(e) => warn!(task = %id, error = %e, "bulk priority item failed"),
            }
        }
        self.finish_bulk("updated", ids.len(), succeeded).await
    }

    /// Restore trashed tasks. Tasks whose target column is full are skipped
    /// and count as failures.
    pub async fn bulk_restore(&mut self, ids: &[String]) -> Result<usize, GatewayError> {
        let mut succeeded = 0;
        for id in ids {
            if self.restore_one(id).await {
                succeeded += 1;
            }
        }
        self.finish_bulk("restored", ids.len(), succeeded).await
    }

    async fn restore_one(&mut self, task_id: &str) -> bool {
        let Ok(task) = self.trashed_task(task_id) else {
            return false;
        };
        let Some(column) = self.state().column(&task.column_id).cloned() else {
            warn!(task = %task_id, "bulk restore skipped, column is gone");
            return false;
        };
        if let Err(v) = wip::check_capacity(&column, &self.state().tasks, 1) {
            warn!(task = %task_id, error = %v, "bulk restore skipped");
            return false;
        }
        self.store.dispatch(Action::RestoreTask(task_id.to_string()));
        let patch = TaskPatch {
            tombstone: Some(None),
            ..Default::default()
        };
        match self.remote.update_task(task_id, &patch).await {
            Ok(_) => true,
            Err(e) => {
                warn!(task = %task_id, error = %e, "bulk restore item failed");
                false
            }
        }
    }

    pub async fn bulk_permanent_delete(&mut self, ids: &[String]) -> Result<usize, GatewayError> {
        for id in ids {
            self.store.dispatch(Action::DeleteTask(id.clone()));
        }
        let mut succeeded = 0;
        for id in ids {
            match self.remote.delete_task(id).await {
                Ok(()) => succeeded += 1,
                Err(e) => warn!(task = %id, error = %e, "permanent delete item failed"),
            }
        }
        self.finish_bulk("permanently deleted", ids.len(), succeeded).await
    }
}
