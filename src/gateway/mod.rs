//! Mutation gateway: every write goes through here.
//!
//! Each operation validates its preconditions, consults the WIP guard when a
//! task enters a column, records history before destructive changes,
//! applies the change to the store, and only then calls the remote. A remote
//! failure is reported as an error notice and followed by a full reload;
//! the optimistic change is never reverted piecemeal.

pub mod bulk;
pub mod trash;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::board::defaults::new_id;
use crate::board::{Column, ColumnPatch, NewTask, Notification, Task, TaskEdit, TaskPatch};
use crate::config::Config;
use crate::notify::{Notice, Notices, Outbox};
use crate::reconcile::{equivalent_column, reconcile};
use crate::remote::{Remote, RemoteError};
use crate::store::{Action, BoardState, TaskStore, ViewMode};
use crate::wip::{self, WipViolation};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Precondition(String),
    #[error(transparent)]
    Wip(#[from] WipViolation),
    #[error("task {0} not found")]
    TaskNotFound(String),
    #[error("column {0} not found")]
    ColumnNotFound(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("{failed} of {attempted} tasks failed")]
    Partial {
        succeeded: usize,
        failed: usize,
        attempted: usize,
    },
}

impl GatewayError {
    fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}

pub struct Gateway {
    remote: Arc<dyn Remote>,
    store: TaskStore,
    notices: Notices,
    outbox: Outbox,
    user_id: String,
    config: Config,
}

impl Gateway {
    /// Build a gateway for `user_id`. Must be called inside a tokio runtime:
    /// the notification outbox worker is spawned here.
    pub fn new(remote: Arc<dyn Remote>, config: Config, user_id: impl Into<String>) -> Self {
        let store = TaskStore::new(BoardState::with_history_depth(config.history_depth));
        let outbox = Outbox::spawn(remote.clone());
        Self {
            remote,
            store,
            notices: Notices::default(),
            outbox,
            user_id: user_id.into(),
            config,
        }
    }

    pub fn state(&self) -> &BoardState {
        self.store.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<BoardState>> {
        self.store.subscribe()
    }

    /// Hand queued notices to the UI.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    /// Close the notification outbox and wait for pending sends.
    pub async fn shutdown(&mut self) -> usize {
        self.outbox.shutdown().await
    }

    // ── Loading ──

    /// Get or create the user's board, seed columns if it has none, then
    /// load tasks.
    pub async fn load_board(&mut self) -> Result<(), GatewayError> {
        let board = match self
            .remote
            .get_or_create_board(&self.user_id, &self.config.board_title)
            .await
        {
            Ok(board) => board,
            Err(e) => return Err(self.report(e.into())),
        };
        let board_id = board.id.clone();
        self.store.dispatch(Action::SetBoard(board));

        let mut columns = match self.remote.list_columns(&board_id).await {
            Ok(columns) => columns,
            Err(e) => return Err(self.report(e.into())),
        };
        if columns.is_empty() {
            columns = match self
                .remote
                .create_default_columns(&board_id, &self.config.columns)
                .await
            {
                Ok(columns) => columns,
                Err(e) => return Err(self.report(e.into())),
            };
            info!(board = %board_id, count = columns.len(), "seeded default columns");
        }
        self.store.dispatch(Action::SetColumns(columns));
        self.load_tasks().await
    }

    /// Reconcile own and assigned tasks into the store.
    pub async fn load_tasks(&mut self) -> Result<(), GatewayError> {
        let Some(board) = self.state().board.clone() else {
            return Err(self.report(GatewayError::precondition("no board loaded")));
        };
        let columns = self.state().columns.clone();
        let reconciled = match reconcile(self.remote.as_ref(), &board, &columns, &self.user_id).await {
            Ok(reconciled) => reconciled,
            Err(e) => return Err(self.report(e.into())),
        };
        for gap in &reconciled.gaps {
            self.notices.warn(gap.to_string());
        }
        self.store.dispatch(Action::SetTasks(reconciled.tasks));
        self.store.dispatch(Action::SetTrash(reconciled.trash));
        Ok(())
    }

    /// Re-read columns and tasks after a failed write.
    async fn resync(&mut self) {
        let Some(board_id) = self.state().board_id().map(str::to_string) else {
            return;
        };
        match self.remote.list_columns(&board_id).await {
            Ok(columns) => self.store.dispatch(Action::SetColumns(columns)),
            Err(e) => {
                self.report(e.into());
                return;
            }
        }
        let _ = self.load_tasks().await;
    }

    // ── Error reporting ──

    /// Turn an error into a notice and hand it back for the caller.
    fn report(&mut self, err: GatewayError) -> GatewayError {
        match &err {
            GatewayError::Wip(v) => {
                warn!(column = %v.column_id, limit = v.limit, "WIP limit rejected move");
                self.notices.warn(err.to_string());
            }
            GatewayError::Partial { .. } => {
                warn!(error = %err, "bulk operation partially failed");
                self.notices.warn(err.to_string());
            }
            GatewayError::Remote(e) => {
                error!(error = %e, "remote call failed");
                self.notices.error(format!("Sync failed: {e}"));
            }
            _ => {
                warn!(error = %err, "operation rejected");
                self.notices.error(err.to_string());
            }
        }
        err
    }

    /// Report a failed remote write and reload to the last remote state.
    async fn recover(&mut self, err: RemoteError) -> GatewayError {
        let err = self.report(err.into());
        self.resync().await;
        err
    }

    // ── Lookups ──

    fn active_task(&self, task_id: &str) -> Result<Task, GatewayError> {
        self.state()
            .task(task_id)
            .filter(|t| !t.is_deleted())
            .cloned()
            .ok_or_else(|| GatewayError::TaskNotFound(task_id.to_string()))
    }

    fn column(&self, column_id: &str) -> Result<Column, GatewayError> {
        self.state()
            .column(column_id)
            .cloned()
            .ok_or_else(|| GatewayError::ColumnNotFound(column_id.to_string()))
    }

    /// Next free position at the end of a column.
    fn end_position(&self, column_id: &str, excluding: Option<&str>) -> u32 {
        self.state()
            .tasks_in_column(column_id)
            .filter(|t| Some(t.id.as_str()) != excluding)
            .count() as u32
    }

    /// Column id to persist when `task` is placed on `local_column_id`.
    /// Tasks from other boards keep a column of their own board.
    async fn owner_column(&self, task: &Task, local_column_id: &str) -> Result<String, GatewayError> {
        if self.state().board_id() == Some(task.board_id.as_str()) {
            return Ok(local_column_id.to_string());
        }
        let local = self.column(local_column_id)?;
        let owner_columns = self.remote.list_columns(&task.board_id).await?;
        equivalent_column(&owner_columns, Some(&local))
            .map(|c| c.id.clone())
            .ok_or_else(|| {
                GatewayError::precondition(format!(
                    "'{}' belongs to another board with no column like '{}'",
                    task.title, local.title
                ))
            })
    }

    fn notify_assignees(&self, task: &Task, assignees: &[&str], message: &str) {
        for user in assignees.iter().filter(|u| **u != self.user_id) {
            self.outbox.enqueue(Notification {
                user_id: user.to_string(),
                task_id: task.id.clone(),
                board_id: task.board_id.clone(),
                message: format!("{message}: {}", task.title),
            });
        }
    }

    // ── Task writes ──

    pub async fn create_task(&mut self, new: NewTask) -> Result<Task, GatewayError> {
        let Some(board_id) = self.state().board_id().map(str::to_string) else {
            return Err(self.report(GatewayError::precondition("no board loaded")));
        };
        let Some(column_id) = new.column_id.clone() else {
            return Err(self.report(GatewayError::precondition("no column selected for the new task")));
        };
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(self.report(GatewayError::precondition("task title is empty")));
        }
        let column = match self.column(&column_id) {
            Ok(column) => column,
            Err(e) => return Err(self.report(e)),
        };
        if let Err(v) = wip::check_capacity(&column, &self.state().tasks, 1) {
            return Err(self.report(v.into()));
        }

        let now = Utc::now();
        let task = Task {
            id: new_id(),
            board_id,
            column_id: column_id.clone(),
            owner_id: self.user_id.clone(),
            title,
            description: new.description,
            priority: new.priority,
            due_date: new.due_date,
            position: self.end_position(&column_id, None),
            archived: false,
            tombstone: None,
            assignees: new.assignees,
            created_at: now,
            updated_at: now,
        };
        self.store.dispatch(Action::AddTask(task.clone()));

        match self.remote.create_task(&task).await {
            Ok(_) => {
                info!(task = %task.id, column = %column_id, "task created");
                let assignees: Vec<&str> = task.assignees.iter().map(String::as_str).collect();
                self.notify_assignees(&task, &assignees, "You were assigned");
                Ok(task)
            }
            Err(e) => Err(self.recover(e).await),
        }
    }

    pub async fn edit_task(&mut self, task_id: &str, edit: TaskEdit) -> Result<Task, GatewayError> {
        let task = match self.active_task(task_id) {
            Ok(task) => task,
            Err(e) => return Err(self.report(e)),
        };
        let patch = TaskPatch::from(edit);
        if patch.is_empty() {
            return Ok(task);
        }
        let mut updated = task.clone();
        updated.apply_patch(&patch);
        self.store.dispatch(Action::UpdateTask(updated.clone()));

        match self.remote.update_task(task_id, &patch).await {
            Ok(_) => {
                info!(task = %task_id, "task edited");
                let added = updated.added_assignees(&task.assignees);
                self.notify_assignees(&updated, &added, "You were assigned");
                Ok(updated)
            }
            Err(e) => Err(self.recover(e).await),
        }
    }

    /// Move a task, appending to the target column unless `position` is
    /// given. Rejected without any change when the target is full.
    pub async fn move_task(
        &mut self,
        task_id: &str,
        column_id: &str,
        position: Option<u32>,
    ) -> Result<(), GatewayError> {
        let found = self
            .active_task(task_id)
            .and_then(|task| Ok((task, self.column(column_id)?)));
        let (task, column) = match found {
            Ok(found) => found,
            Err(e) => return Err(self.report(e)),
        };
        if task.column_id == column_id && position.map_or(true, |p| p == task.position) {
            return Ok(());
        }
        if let Err(v) = wip::check_move(&column, &self.state().tasks, task_id) {
            return Err(self.report(v.into()));
        }
        let position = position.unwrap_or_else(|| self.end_position(column_id, Some(task_id)));
        let remote_column = match self.owner_column(&task, column_id).await {
            Ok(id) => id,
            Err(e) => return Err(self.report(e)),
        };

        self.store.dispatch(Action::PushHistory);
        self.store.dispatch(Action::MoveTask {
            task_id: task_id.to_string(),
            column_id: column_id.to_string(),
            position,
        });

        match self
            .remote
            .update_task(task_id, &TaskPatch::moved(&remote_column, position))
            .await
        {
            Ok(_) => {
                info!(task = %task_id, column = %column_id, position, "task moved");
                Ok(())
            }
            Err(e) => Err(self.recover(e).await),
        }
    }

    pub async fn archive_task(&mut self, task_id: &str) -> Result<(), GatewayError> {
        self.set_archived(task_id, true).await
    }

    /// Unarchiving brings the task back into its column's WIP count.
    pub async fn unarchive_task(&mut self, task_id: &str) -> Result<(), GatewayError> {
        self.set_archived(task_id, false).await
    }

    async fn set_archived(&mut self, task_id: &str, archived: bool) -> Result<(), GatewayError> {
        let task = match self.active_task(task_id) {
            Ok(task) => task,
            Err(e) => return Err(self.report(e)),
        };
        if task.archived == archived {
            return Ok(());
        }
        if !archived {
            if let Some(column) = self.state().column(&task.column_id) {
                if let Err(v) = wip::check_capacity(column, &self.state().tasks, 1) {
                    return Err(self.report(v.into()));
                }
            }
        }
        let patch = TaskPatch {
            archived: Some(archived),
            ..Default::default()
        };
        let mut updated = task;
        updated.apply_patch(&patch);
        self.store.dispatch(Action::UpdateTask(updated));

        match self.remote.update_task(task_id, &patch).await {
            Ok(_) => {
                info!(task = %task_id, archived, "archive flag updated");
                Ok(())
            }
            Err(e) => Err(self.recover(e).await),
        }
    }

    // ── Columns ──

    /// Update position or WIP limit. A limit of zero is rejected; `None`
    /// removes the limit.
    pub async fn update_column(&mut self, column_id: &str, patch: ColumnPatch) -> Result<Column, GatewayError> {
        if patch.wip_limit == Some(Some(0)) {
            return Err(self.report(GatewayError::precondition(
                "WIP limit must be positive (remove it for unlimited)",
            )));
        }
        let mut column = match self.column(column_id) {
            Ok(column) => column,
            Err(e) => return Err(self.report(e)),
        };
        if let Some(position) = patch.position {
            column.position = position;
        }
        if let Some(limit) = patch.wip_limit {
            column.wip_limit = limit;
        }
        self.store.dispatch(Action::UpdateColumn(column.clone()));

        match self.remote.update_column(column_id, &patch).await {
            Ok(saved) => {
                info!(column = %column_id, wip_limit = ?saved.wip_limit, "column updated");
                Ok(saved)
            }
            Err(e) => Err(self.recover(e).await),
        }
    }

    /// Whether `task_id` may move into `column_id` right now.
    pub fn check_wip_limit(&self, column_id: &str, task_id: &str) -> Result<(), GatewayError> {
        let column = self.column(column_id)?;
        wip::check_move(&column, &self.state().tasks, task_id)?;
        Ok(())
    }

    // ── History ──

    pub async fn undo(&mut self) -> Result<(), GatewayError> {
        if !self.state().can_undo() {
            return Ok(());
        }
        self.step_history(Action::Undo).await
    }

    pub async fn redo(&mut self) -> Result<(), GatewayError> {
        if !self.state().can_redo() {
            return Ok(());
        }
        self.step_history(Action::Redo).await
    }

    /// Apply an undo/redo locally, then persist every task that changed.
    async fn step_history(&mut self, action: Action) -> Result<(), GatewayError> {
        // A reload may have moved trashed tasks out of the live collection.
        let before: Vec<Task> = self
            .state()
            .tasks
            .iter()
            .chain(self.state().trash.iter())
            .cloned()
            .collect();
        self.store.dispatch(action);
        let after = self.state().tasks.clone();

        let mut first_err: Option<GatewayError> = None;
        for task in &after {
            let Some(prev) = before.iter().find(|t| t.id == task.id) else {
                continue;
            };
            let mut patch = TaskPatch::diff(prev, task);
            if patch.is_empty() {
                continue;
            }
            if patch.column_id.is_some() {
                match self.owner_column(task, &task.column_id).await {
                    Ok(id) => patch.column_id = Some(id),
                    Err(e) => {
                        warn!(task = %task.id, error = %e, "cannot persist column after history step");
                        first_err.get_or_insert(e);
                        continue;
                    }
                }
            }
            if let Err(e) = self.remote.update_task(&task.id, &patch).await {
                first_err.get_or_insert(e.into());
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => {
                let e = self.report(e);
                self.resync().await;
                Err(e)
            }
        }
    }

    // ── Selection and view ──

    pub fn toggle_selection(&mut self, task_id: &str) {
        let Some(column_id) = self.state().task(task_id).map(|t| t.column_id.clone()) else {
            return;
        };
        self.store.dispatch(Action::ToggleSelection {
            task_id: task_id.to_string(),
            column_id,
        });
    }

    pub fn clear_selection(&mut self) {
        self.store.dispatch(Action::ClearSelection);
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.state().selection.task_ids().map(str::to_string).collect()
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.store.dispatch(Action::SetSearchQuery(query.into()));
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.store.dispatch(Action::SetViewMode(mode));
    }

    pub fn toggle_focus_mode(&mut self) {
        self.store.dispatch(Action::ToggleFocusMode);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::board::{ColumnRole, Priority};
    use crate::notify::NoticeLevel;
    use crate::remote::memory::MemoryRemote;

    pub(crate) async fn loaded(remote: &MemoryRemote) -> Gateway {
        let mut gw = Gateway::new(Arc::new(remote.clone()), Config::default(), "alice");
        gw.load_board().await.unwrap();
        gw
    }

    pub(crate) fn column_id(gw: &Gateway, role: ColumnRole) -> String {
        gw.state().column_by_role(role).unwrap().id.clone()
    }

    pub(crate) async fn add(gw: &mut Gateway, title: &str, role: ColumnRole) -> Task {
        let column_id = column_id(gw, role);
        gw.create_task(NewTask {
            title: title.into(),
            column_id: Some(column_id),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn load_board_seeds_columns_once() {
        let remote = MemoryRemote::new();
        let gw = loaded(&remote).await;
        assert_eq!(gw.state().columns.len(), 4);
        let board_id = gw.state().board_id().unwrap().to_string();

        let again = loaded(&remote).await;
        assert_eq!(again.state().board_id(), Some(board_id.as_str()));
        assert_eq!(remote.list_columns(&board_id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn create_assigns_sequential_positions() {
        let remote = MemoryRemote::new();
        let mut gw = loaded(&remote).await;
        let todo = column_id(&gw, ColumnRole::Backlog);

        let first = gw
            .create_task(NewTask {
                title: "Write docs".into(),
                priority: Priority::High,
                column_id: Some(todo.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(first.position, 0);
        assert_eq!(first.priority, Priority::High);

        let second = add(&mut gw, "Review docs", ColumnRole::Backlog).await;
        assert_eq!(second.position, 1);
        assert_eq!(remote.task(&second.id).await.unwrap().position, 1);
        assert_eq!(gw.state().column_tasks(&todo).len(), 2);
    }

    #[tokio::test]
    async fn create_without_column_is_reported() {
        let remote = MemoryRemote::new();
        let mut gw = loaded(&remote).await;
        let writes = remote.write_count().await;
        let err = gw
            .create_task(NewTask {
                title: "Orphan".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Precondition(_)));
        let notices = gw.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(gw.state().tasks.is_empty());
        assert_eq!(remote.write_count().await, writes);
    }

    #[tokio::test]
    async fn create_without_board_is_reported() {
        let remote = MemoryRemote::new();
        let mut gw = Gateway::new(Arc::new(remote.clone()), Config::default(), "alice");
        let err = gw
            .create_task(NewTask {
                title: "Early".into(),
                column_id: Some("c1".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::precondition("no board loaded"));
    }

    #[tokio::test]
    async fn move_into_full_column_is_rejected() {
        let remote = MemoryRemote::new();
        let mut gw = loaded(&remote).await;
        let done = column_id(&gw, ColumnRole::Done);
        gw.update_column(
            &done,
            ColumnPatch {
                wip_limit: Some(Some(2)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        add(&mut gw, "one", ColumnRole::Done).await;
        add(&mut gw, "two", ColumnRole::Done).await;
        let third = add(&mut gw, "three", ColumnRole::Backlog).await;
        let writes = remote.write_count().await;

        let err = gw.move_task(&third.id, &done, None).await.unwrap_err();
        assert!(matches!(err, GatewayError::Wip(_)));
        assert_eq!(gw.state().task(&third.id).unwrap().column_id, third.column_id);
        assert_eq!(remote.write_count().await, writes);
        assert!(!gw.state().can_undo());
        let notices = gw.drain_notices();
        assert_eq!(notices[0].level, NoticeLevel::Warning);
    }

    #[tokio::test]
    async fn move_appends_and_persists() {
        let remote = MemoryRemote::new();
        let mut gw = loaded(&remote).await;
        let review = column_id(&gw, ColumnRole::Review);
        add(&mut gw, "already there", ColumnRole::Review).await;
        let task = add(&mut gw, "mover", ColumnRole::Backlog).await;

        gw.move_task(&task.id, &review, None).await.unwrap();
        let local = gw.state().task(&task.id).unwrap();
        assert_eq!(local.column_id, review);
        assert_eq!(local.position, 1);
        let saved = remote.task(&task.id).await.unwrap();
        assert_eq!(saved.column_id, review);
        assert!(gw.state().can_undo());
    }

    #[tokio::test]
    async fn optimistic_move_visible_before_remote_resolves() {
        let remote = MemoryRemote::new();
        let mut gw = loaded(&remote).await;
        let done = column_id(&gw, ColumnRole::Done);
        let task = add(&mut gw, "fast", ColumnRole::Backlog).await;
        let mut rx = gw.subscribe();

        remote.pause_writes();
        let observer = async {
            loop {
                let moved = rx
                    .borrow_and_update()
                    .task(&task.id)
                    .is_some_and(|t| t.column_id == done);
                if moved {
                    break;
                }
                rx.changed().await.unwrap();
            }
            assert_ne!(remote.task(&task.id).await.unwrap().column_id, done);
            remote.resume_writes();
        };
        let (result, ()) = tokio::join!(gw.move_task(&task.id, &done, None), observer);
        result.unwrap();
        assert_eq!(remote.task(&task.id).await.unwrap().column_id, done);
    }

    #[tokio::test]
    async fn remote_failure_reports_and_reloads() {
        let remote = MemoryRemote::new();
        let mut gw = loaded(&remote).await;
        let done = column_id(&gw, ColumnRole::Done);
        let task = add(&mut gw, "flaky", ColumnRole::Backlog).await;
        remote.fail_task(&task.id).await;

        let err = gw.move_task(&task.id, &done, None).await.unwrap_err();
        assert!(matches!(err, GatewayError::Remote(_)));
        // The reload put the task back where the remote has it.
        assert_eq!(gw.state().task(&task.id).unwrap().column_id, task.column_id);
        let notices = gw.drain_notices();
        assert!(notices.iter().any(|n| n.level == NoticeLevel::Error));
    }

    #[tokio::test]
    async fn edit_notifies_new_assignees_only() {
        let remote = MemoryRemote::new();
        let mut gw = loaded(&remote).await;
        let todo = column_id(&gw, ColumnRole::Backlog);
        let task = gw
            .create_task(NewTask {
                title: "Pair".into(),
                column_id: Some(todo),
                assignees: vec!["bob".into(), "alice".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        let edited = gw
            .edit_task(
                &task.id,
                TaskEdit {
                    title: Some("Pair up".into()),
                    assignees: Some(vec!["bob".into(), "carol".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.title, "Pair up");
        gw.shutdown().await;

        let users: Vec<String> = remote
            .notifications()
            .await
            .into_iter()
            .map(|n| n.user_id)
            .collect();
        assert_eq!(users, ["bob", "carol"]);
    }

    #[tokio::test]
    async fn unarchive_respects_wip_limit() {
        let remote = MemoryRemote::new();
        let mut gw = loaded(&remote).await;
        let wip_col = column_id(&gw, ColumnRole::InProgress);
        let parked = add(&mut gw, "parked", ColumnRole::InProgress).await;
        gw.archive_task(&parked.id).await.unwrap();
        gw.update_column(
            &wip_col,
            ColumnPatch {
                wip_limit: Some(Some(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        add(&mut gw, "busy", ColumnRole::InProgress).await;

        let err = gw.unarchive_task(&parked.id).await.unwrap_err();
        assert!(matches!(err, GatewayError::Wip(_)));
        assert!(gw.state().task(&parked.id).unwrap().archived);
        assert!(remote.task(&parked.id).await.unwrap().archived);
    }

    #[tokio::test]
    async fn zero_wip_limit_rejected() {
        let remote = MemoryRemote::new();
        let mut gw = loaded(&remote).await;
        let done = column_id(&gw, ColumnRole::Done);
        let err = gw
            .update_column(
                &done,
                ColumnPatch {
                    wip_limit: Some(Some(0)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Precondition(_)));
        assert_eq!(remote.column(&done).await.unwrap().wip_limit, None);
    }

    #[tokio::test]
    async fn undo_move_restores_column_remotely() {
        let remote = MemoryRemote::new();
        let mut gw = loaded(&remote).await;
        let done = column_id(&gw, ColumnRole::Done);
        let task = add(&mut gw, "bounce", ColumnRole::Backlog).await;
        gw.move_task(&task.id, &done, None).await.unwrap();

        gw.undo().await.unwrap();
        assert_eq!(gw.state().task(&task.id).unwrap().column_id, task.column_id);
        assert_eq!(remote.task(&task.id).await.unwrap().column_id, task.column_id);

        gw.redo().await.unwrap();
        assert_eq!(remote.task(&task.id).await.unwrap().column_id, done);
        // Redo at the end is a no-op.
        gw.redo().await.unwrap();
        assert_eq!(gw.state().task(&task.id).unwrap().column_id, done);
    }

    #[tokio::test]
    async fn selection_collapses_across_columns() {
        let remote = MemoryRemote::new();
        let mut gw = loaded(&remote).await;
        let a: Vec<Task> = add_many(&mut gw, ColumnRole::Backlog, 3).await;
        let b = add(&mut gw, "other", ColumnRole::Review).await;
        for task in &a {
            gw.toggle_selection(&task.id);
        }
        assert_eq!(gw.selected_ids().len(), 3);
        gw.toggle_selection(&b.id);
        assert_eq!(gw.selected_ids(), [b.id.clone()]);
        assert_eq!(gw.state().selection.column_id(), Some(b.column_id.as_str()));
    }

    async fn add_many(gw: &mut Gateway, role: ColumnRole, n: usize) -> Vec<Task> {
        let mut out = Vec::new();
        for i in 0..n {
            out.push(add(gw, &format!("task {i}"), role).await);
        }
        out
    }

    #[tokio::test]
    async fn moving_foreign_task_persists_owner_column() {
        let remote = MemoryRemote::new();
        // Bob's board with his own Done column.
        let mut bob = Gateway::new(Arc::new(remote.clone()), Config::default(), "bob");
        bob.load_board().await.unwrap();
        let bob_todo = column_id(&bob, ColumnRole::Backlog);
        let bob_done = column_id(&bob, ColumnRole::Done);
        let shared = bob
            .create_task(NewTask {
                title: "Shared".into(),
                column_id: Some(bob_todo),
                assignees: vec!["alice".into()],
                ..Default::default()
            })
            .await
            .unwrap();

        let mut alice = loaded(&remote).await;
        let alice_done = column_id(&alice, ColumnRole::Done);
        let mapped = alice.state().task(&shared.id).unwrap().clone();
        assert_eq!(mapped.column_id, column_id(&alice, ColumnRole::Backlog));

        alice.move_task(&shared.id, &alice_done, None).await.unwrap();
        assert_eq!(alice.state().task(&shared.id).unwrap().column_id, alice_done);
        let saved = remote.task(&shared.id).await.unwrap();
        assert_eq!(saved.column_id, bob_done);
        assert_eq!(saved.board_id, shared.board_id);
    }

    #[tokio::test]
    async fn undo_without_owner_column_reports_and_reloads() {
        let remote = MemoryRemote::new();
        let mut bob = Gateway::new(Arc::new(remote.clone()), Config::default(), "bob");
        bob.load_board().await.unwrap();
        let bob_todo = column_id(&bob, ColumnRole::Backlog);
        let bob_done = column_id(&bob, ColumnRole::Done);
        let shared = bob
            .create_task(NewTask {
                title: "Shared".into(),
                column_id: Some(bob_todo.clone()),
                assignees: vec!["alice".into()],
                ..Default::default()
            })
            .await
            .unwrap();

        let mut alice = loaded(&remote).await;
        let alice_done = column_id(&alice, ColumnRole::Done);
        alice.move_task(&shared.id, &alice_done, None).await.unwrap();
        alice.drain_notices();

        // Bob's board no longer has anything like To Do.
        remote
            .insert_column(Column::new(bob_todo, shared.board_id.clone(), "Icebox".into(), 0))
            .await;

        let err = alice.undo().await.unwrap_err();
        assert!(matches!(err, GatewayError::Precondition(_)));
        let notices = alice.drain_notices();
        assert!(notices.iter().any(|n| n.level == NoticeLevel::Error));
        // Local state was reloaded to match the remote.
        assert_eq!(remote.task(&shared.id).await.unwrap().column_id, bob_done);
        assert_eq!(alice.state().task(&shared.id).unwrap().column_id, alice_done);
    }

    #[tokio::test]
    async fn view_state_dispatches() {
        let remote = MemoryRemote::new();
        let mut gw = loaded(&remote).await;
        gw.set_search_query("docs");
        gw.set_view_mode(ViewMode::List);
        gw.toggle_focus_mode();
        assert_eq!(gw.state().search_query, "docs");
        assert_eq!(gw.state().view_mode, ViewMode::List);
        assert!(gw.state().focus_mode);
    }
}
