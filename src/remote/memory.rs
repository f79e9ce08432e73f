//! In-memory remote backed by hash maps.
//!
//! Used by tests and demos. Besides plain CRUD it can inject failures for
//! chosen task ids (or every write) and hold writes until released, which
//! lets callers observe optimistic state while a write is still in flight.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, Mutex};

use super::{Remote, RemoteError, RemoteResult};
use crate::board::defaults::{new_id, seed_columns};
use crate::board::{Board, Column, ColumnPatch, Notification, Task, TaskPatch};
use crate::config::ColumnSeed;

#[derive(Default)]
struct Inner {
    boards: HashMap<String, Board>,
    columns: HashMap<String, Column>,
    tasks: HashMap<String, Task>,
    notifications: Vec<Notification>,
    failing_tasks: HashSet<String>,
    fail_writes: bool,
    fail_reads: bool,
    writes: usize,
}

impl Inner {
    fn check_write(&mut self, task_id: Option<&str>) -> RemoteResult<()> {
        if self.fail_writes || task_id.is_some_and(|id| self.failing_tasks.contains(id)) {
            return Err(RemoteError::Unavailable("injected write failure".into()));
        }
        self.writes += 1;
        Ok(())
    }

    fn check_read(&self) -> RemoteResult<()> {
        if self.fail_reads {
            return Err(RemoteError::Unavailable("injected read failure".into()));
        }
        Ok(())
    }
}

/// Cloneable handle; clones share the same data.
#[derive(Clone)]
pub struct MemoryRemote {
    inner: Arc<Mutex<Inner>>,
    paused: Arc<watch::Sender<bool>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            paused: Arc::new(tx),
        }
    }

    pub async fn insert_column(&self, column: Column) {
        self.inner.lock().await.columns.insert(column.id.clone(), column);
    }

    pub async fn insert_task(&self, task: Task) {
        self.inner.lock().await.tasks.insert(task.id.clone(), task);
    }

    pub async fn task(&self, id: &str) -> Option<Task> {
        self.inner.lock().await.tasks.get(id).cloned()
    }

    pub async fn column(&self, id: &str) -> Option<Column> {
        self.inner.lock().await.columns.get(id).cloned()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.inner.lock().await.notifications.clone()
    }

    /// Number of successful writes so far.
    pub async fn write_count(&self) -> usize {
        self.inner.lock().await.writes
    }

    /// Make every write touching `task_id` fail.
    pub async fn fail_task(&self, task_id: &str) {
        self.inner.lock().await.failing_tasks.insert(task_id.to_string());
    }

    pub async fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().await.fail_writes = fail;
    }

    pub async fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().await.fail_reads = fail;
    }

    /// Hold every subsequent write until [`MemoryRemote::resume_writes`].
    pub fn pause_writes(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume_writes(&self) {
        self.paused.send_replace(false);
    }

    async fn wait_unpaused(&self) {
        let mut rx = self.paused.subscribe();
        let _ = rx.wait_for(|paused| !*paused).await;
    }
}

#[async_trait]
impl Remote for MemoryRemote {
    async fn get_or_create_board(&self, owner_id: &str, title: &str) -> RemoteResult<Board> {
        let mut inner = self.inner.lock().await;
        inner.check_read()?;
        if let Some(board) = inner.boards.values().find(|b| b.owner_id == owner_id) {
            return Ok(board.clone());
        }
        inner.check_write(None)?;
        let board = Board {
            id: new_id(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            created_at: Utc::now(),
        };
        inner.boards.insert(board.id.clone(), board.clone());
        Ok(board)
    }

    async fn list_columns(&self, board_id: &str) -> RemoteResult<Vec<Column>> {
        let inner = self.inner.lock().await;
        inner.check_read()?;
        let mut columns: Vec<Column> = inner
            .columns
            .values()
            .filter(|c| c.board_id == board_id)
            .cloned()
            .collect();
        columns.sort_by_key(|c| c.position);
        Ok(columns)
    }

    async fn create_default_columns(
        &self,
        board_id: &str,
        seeds: &[ColumnSeed],
    ) -> RemoteResult<Vec<Column>> {
        self.wait_unpaused().await;
        let mut inner = self.inner.lock().await;
        inner.check_write(None)?;
        let columns = seed_columns(board_id, seeds);
        for col in &columns {
            inner.columns.insert(col.id.clone(), col.clone());
        }
        Ok(columns)
    }

    async fn update_column(&self, column_id: &str, patch: &ColumnPatch) -> RemoteResult<Column> {
        self.wait_unpaused().await;
        let mut inner = self.inner.lock().await;
        inner.check_write(None)?;
        let column = inner
            .columns
            .get_mut(column_id)
            .ok_or_else(|| RemoteError::column_not_found(column_id))?;
        if let Some(position) = patch.position {
            column.position = position;
        }
        if let Some(limit) = patch.wip_limit {
            column.wip_limit = limit;
        }
        Ok(column.clone())
    }

    async fn get_column(&self, column_id: &str) -> RemoteResult<Option<Column>> {
        let inner = self.inner.lock().await;
        inner.check_read()?;
        Ok(inner.columns.get(column_id).cloned())
    }

    async fn create_task(&self, task: &Task) -> RemoteResult<Task> {
        self.wait_unpaused().await;
        let mut inner = self.inner.lock().await;
        inner.check_write(Some(&task.id))?;
        if inner.tasks.contains_key(&task.id) {
            return Err(RemoteError::Conflict {
                kind: "task",
                id: task.id.clone(),
            });
        }
        inner.tasks.insert(task.id.clone(), task.clone());
        Ok(task.clone())
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> RemoteResult<Task> {
        self.wait_unpaused().await;
        let mut inner = self.inner.lock().await;
        inner.check_write(Some(task_id))?;
        let task = inner
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| RemoteError::task_not_found(task_id))?;
        task.apply_patch(patch);
        Ok(task.clone())
    }

    async fn delete_task(&self, task_id: &str) -> RemoteResult<()> {
        self.wait_unpaused().await;
        let mut inner = self.inner.lock().await;
        inner.check_write(Some(task_id))?;
        inner
            .tasks
            .remove(task_id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::task_not_found(task_id))
    }

    async fn list_tasks_by_board(&self, board_id: &str) -> RemoteResult<Vec<Task>> {
        let inner = self.inner.lock().await;
        inner.check_read()?;
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.board_id == board_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn list_tasks_by_assignee(&self, user_id: &str) -> RemoteResult<Vec<Task>> {
        let inner = self.inner.lock().await;
        inner.check_read()?;
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.assignees.iter().any(|a| a == user_id))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn create_notification(&self, notification: &Notification) -> RemoteResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check_write(None)?;
        inner.notifications.push(notification.clone());
        Ok(())
    }
}
