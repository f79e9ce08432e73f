//! The persistence collaborator. The store treats it as the source of truth
//! and reaches it only through this trait.

pub mod memory;

use async_trait::async_trait;

use crate::board::{Board, Column, ColumnPatch, Notification, Task, TaskPatch};
use crate::config::ColumnSeed;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} {id} already exists")]
    Conflict { kind: &'static str, id: String },
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl RemoteError {
    pub fn task_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "task",
            id: id.to_string(),
        }
    }

    pub fn column_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "column",
            id: id.to_string(),
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// CRUD surface of the remote service, grouped as board, column, task and
/// notification operations. Every call is a suspension point.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Return the user's board, creating it with `title` if absent.
    async fn get_or_create_board(&self, owner_id: &str, title: &str) -> RemoteResult<Board>;

    async fn list_columns(&self, board_id: &str) -> RemoteResult<Vec<Column>>;

    /// Create the seed column set for a board that has none.
    async fn create_default_columns(
        &self,
        board_id: &str,
        seeds: &[ColumnSeed],
    ) -> RemoteResult<Vec<Column>>;

    async fn update_column(&self, column_id: &str, patch: &ColumnPatch) -> RemoteResult<Column>;

    /// Single column lookup, used for title matching of foreign tasks.
    async fn get_column(&self, column_id: &str) -> RemoteResult<Option<Column>>;

    /// Persist a task built by the client (id included).
    async fn create_task(&self, task: &Task) -> RemoteResult<Task>;

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> RemoteResult<Task>;

    /// Irreversible delete.
    async fn delete_task(&self, task_id: &str) -> RemoteResult<()>;

    /// All tasks owned by a board, tombstoned ones included.
    async fn list_tasks_by_board(&self, board_id: &str) -> RemoteResult<Vec<Task>>;

    /// Tasks on any board where `user_id` is an assignee.
    async fn list_tasks_by_assignee(&self, user_id: &str) -> RemoteResult<Vec<Task>>;

    async fn create_notification(&self, notification: &Notification) -> RemoteResult<()>;
}
