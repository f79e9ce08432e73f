use chrono::{DateTime, Utc};

use crate::board::{Board, Column, Task};

/// Board presentation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Board,
    List,
    Trash,
}

/// Every state transition the task store accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // Loading
    SetBoard(Board),
    SetColumns(Vec<Column>),
    SetTasks(Vec<Task>),
    SetTrash(Vec<Task>),

    // Task mutations
    AddTask(Task),
    UpdateTask(Task),
    DeleteTask(String),
    MoveTask {
        task_id: String,
        column_id: String,
        position: u32,
    },
    SoftDeleteTask {
        task_id: String,
        deleted_by: String,
        deleted_at: DateTime<Utc>,
    },
    RestoreTask(String),

    // Columns
    UpdateColumn(Column),

    // History
    PushHistory,
    Undo,
    Redo,

    // Selection and view
    ToggleSelection {
        task_id: String,
        column_id: String,
    },
    ClearSelection,
    SetSearchQuery(String),
    SetViewMode(ViewMode),
    ToggleFocusMode,
}

impl Action {
    /// Short name used in trace output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetBoard(_) => "set-board",
            Self::SetColumns(_) => "set-columns",
            Self::SetTasks(_) => "set-tasks",
            Self::SetTrash(_) => "set-trash",
            Self::AddTask(_) => "add-task",
            Self::UpdateTask(_) => "update-task",
            Self::DeleteTask(_) => "delete-task",
            Self::MoveTask { .. } => "move-task",
            Self::SoftDeleteTask { .. } => "soft-delete-task",
            Self::RestoreTask(_) => "restore-task",
            Self::UpdateColumn(_) => "update-column",
            Self::PushHistory => "push-history",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::ToggleSelection { .. } => "toggle-selection",
            Self::ClearSelection => "clear-selection",
            Self::SetSearchQuery(_) => "set-search-query",
            Self::SetViewMode(_) => "set-view-mode",
            Self::ToggleFocusMode => "toggle-focus-mode",
        }
    }
}
