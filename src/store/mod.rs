//! The task store: a deterministic reducer over [`BoardState`].
//!
//! Actions never perform I/O and never fail. Unknown task or column ids
//! turn the action into a no-op. Every dispatched action publishes the new
//! state to subscribers, so a change is observable before any remote write
//! that follows it has resolved.

pub mod action;
pub mod history;
pub mod selection;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::board::{sort_column_tasks, Board, Column, ColumnRole, Task, Tombstone};
pub use action::{Action, ViewMode};
use history::History;
use selection::Selection;

#[derive(Debug, Clone, Default)]
pub struct BoardState {
    pub board: Option<Board>,
    pub columns: Vec<Column>,
    /// Live task collection. Soft-deleted tasks stay here (tombstoned) until
    /// the next reload so history snapshots can restore them.
    pub tasks: Vec<Task>,
    /// Tombstoned tasks loaded from the remote for the trash view.
    pub trash: Vec<Task>,
    pub history: History,
    pub selection: Selection,
    pub search_query: String,
    pub view_mode: ViewMode,
    pub focus_mode: bool,
}

impl BoardState {
    pub fn with_history_depth(depth: usize) -> Self {
        Self {
            history: History::new(depth),
            ..Default::default()
        }
    }

    pub fn board_id(&self) -> Option<&str> {
        self.board.as_ref().map(|b| b.id.as_str())
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    pub fn column_by_role(&self, role: ColumnRole) -> Option<&Column> {
        self.columns.iter().find(|c| c.role == role)
    }

    pub fn column_by_title(&self, title: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.title_matches(title))
    }

    /// Tasks that are not in the trash.
    pub fn active_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| !t.is_deleted())
    }

    /// Non-deleted tasks in a column, ignoring the search query.
    pub fn tasks_in_column<'a>(&'a self, column_id: &'a str) -> impl Iterator<Item = &'a Task> {
        self.active_tasks().filter(move |t| t.column_id == column_id)
    }

    /// Rendered content of a column: non-deleted, non-archived, matching the
    /// search query, in display order.
    pub fn column_tasks(&self, column_id: &str) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self
            .active_tasks()
            .filter(|t| t.column_id == column_id && !t.archived && self.matches_search(t))
            .collect();
        sort_column_tasks(&mut tasks);
        tasks
    }

    pub fn archived_tasks(&self) -> Vec<&Task> {
        self.active_tasks().filter(|t| t.archived).collect()
    }

    /// Soft-deleted tasks, from the live collection and the loaded trash.
    pub fn trashed_tasks(&self) -> Vec<&Task> {
        let mut out: Vec<&Task> = self.tasks.iter().filter(|t| t.is_deleted()).collect();
        out.extend(
            self.trash
                .iter()
                .filter(|t| !self.tasks.iter().any(|live| live.id == t.id)),
        );
        out
    }

    pub fn matches_search(&self, task: &Task) -> bool {
        let query = self.search_query.trim();
        if query.is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        task.title.to_lowercase().contains(&query)
            || task.description.to_lowercase().contains(&query)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Swap in a history snapshot. Trash entries now present in the live
    /// collection are dropped so a task never appears twice.
    fn replace_tasks(&mut self, snapshot: &[Task]) {
        self.tasks = snapshot.to_vec();
        let tasks = &self.tasks;
        self.trash.retain(|t| !tasks.iter().any(|live| live.id == t.id));
        self.selection
            .retain(|id| tasks.iter().any(|t| t.id == id && !t.is_deleted()));
    }

    /// Apply one action in place.
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::SetBoard(board) => self.board = Some(board),
            Action::SetColumns(mut columns) => {
                columns.sort_by_key(|c| c.position);
                self.columns = columns;
            }
            Action::SetTasks(tasks) => {
                self.tasks = tasks;
                let tasks = &self.tasks;
                self.selection
                    .retain(|id| tasks.iter().any(|t| t.id == id && !t.is_deleted()));
            }
            Action::SetTrash(trash) => self.trash = trash,
            Action::AddTask(task) => match self.tasks.iter_mut().find(|t| t.id == task.id) {
                Some(existing) => *existing = task,
                None => self.tasks.push(task),
            },
            Action::UpdateTask(task) => {
                if let Some(existing) = self.tasks.iter_mut().find(|t| t.id == task.id) {
                    *existing = task;
                } else if let Some(existing) = self.trash.iter_mut().find(|t| t.id == task.id) {
                    *existing = task;
                }
            }
            Action::DeleteTask(task_id) => {
                self.tasks.retain(|t| t.id != task_id);
                self.trash.retain(|t| t.id != task_id);
                self.selection.retain(|id| id != task_id);
                self.history.forget(&task_id);
            }
            Action::MoveTask {
                task_id,
                column_id,
                position,
            } => {
                if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
                    task.column_id = column_id;
                    task.position = position;
                    task.touch();
                }
            }
            Action::SoftDeleteTask {
                task_id,
                deleted_by,
                deleted_at,
            } => {
                if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
                    task.tombstone = Some(Tombstone {
                        deleted_at,
                        deleted_by,
                    });
                    task.touch();
                    self.selection.retain(|id| id != task_id);
                }
            }
            Action::RestoreTask(task_id) => {
                if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
                    task.tombstone = None;
                    task.touch();
                } else if let Some(idx) = self.trash.iter().position(|t| t.id == task_id) {
                    let mut task = self.trash.remove(idx);
                    task.tombstone = None;
                    task.touch();
                    self.tasks.push(task);
                }
                self.trash.retain(|t| t.id != task_id);
            }
            Action::UpdateColumn(column) => {
                if let Some(existing) = self.columns.iter_mut().find(|c| c.id == column.id) {
                    *existing = column;
                    self.columns.sort_by_key(|c| c.position);
                }
            }
            Action::PushHistory => {
                self.history.push(Arc::from(self.tasks.as_slice()));
            }
            Action::Undo => {
                // The redo target keeps tasks a reload moved into the trash.
                let mut live = self.tasks.clone();
                live.extend(
                    self.trash
                        .iter()
                        .filter(|t| !self.tasks.iter().any(|live| live.id == t.id))
                        .cloned(),
                );
                if let Some(snapshot) = self.history.undo(&live) {
                    self.replace_tasks(&snapshot);
                }
            }
            Action::Redo => {
                if let Some(snapshot) = self.history.redo() {
                    self.replace_tasks(&snapshot);
                }
            }
            Action::ToggleSelection { task_id, column_id } => {
                self.selection.toggle(&task_id, &column_id);
            }
            Action::ClearSelection => self.selection.clear(),
            Action::SetSearchQuery(query) => self.search_query = query,
            Action::SetViewMode(mode) => self.view_mode = mode,
            Action::ToggleFocusMode => self.focus_mode = !self.focus_mode,
        }
    }
}

/// Owns the state and publishes each new version.
pub struct TaskStore {
    state: Arc<BoardState>,
    tx: watch::Sender<Arc<BoardState>>,
}

impl TaskStore {
    pub fn new(state: BoardState) -> Self {
        let state = Arc::new(state);
        let (tx, _) = watch::channel(state.clone());
        Self { state, tx }
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    /// Receiver that sees every state published after a dispatch.
    pub fn subscribe(&self) -> watch::Receiver<Arc<BoardState>> {
        self.tx.subscribe()
    }

    pub fn dispatch(&mut self, action: Action) {
        debug!(action = action.name(), "dispatch");
        Arc::make_mut(&mut self.state).apply(action);
        self.tx.send_replace(self.state.clone());
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new(BoardState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::make_task;
    use crate::board::Priority;
    use chrono::{TimeZone, Utc};

    fn state_with(tasks: Vec<Task>) -> BoardState {
        let mut state = BoardState::default();
        state.apply(Action::SetColumns(vec![
            Column::new("todo".into(), "b1".into(), "To Do".into(), 0),
            Column::new("done".into(), "b1".into(), "Done".into(), 1),
        ]));
        state.apply(Action::SetTasks(tasks));
        state
    }

    fn deleted_at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 16, 9, 0, 0).unwrap()
    }

    #[test]
    fn unknown_ids_are_noops() {
        let mut state = state_with(vec![make_task("t1", "b1", "todo", 0)]);
        let before = state.tasks.clone();
        state.apply(Action::MoveTask {
            task_id: "missing".into(),
            column_id: "done".into(),
            position: 0,
        });
        state.apply(Action::DeleteTask("missing".into()));
        state.apply(Action::UpdateTask(make_task("missing", "b1", "todo", 0)));
        state.apply(Action::RestoreTask("missing".into()));
        state.apply(Action::SoftDeleteTask {
            task_id: "missing".into(),
            deleted_by: "alice".into(),
            deleted_at: deleted_at(),
        });
        state.apply(Action::UpdateColumn(Column::new(
            "nope".into(),
            "b1".into(),
            "Nope".into(),
            9,
        )));
        assert_eq!(state.tasks, before);
        assert_eq!(state.columns.len(), 2);
    }

    #[test]
    fn move_task_updates_column_and_position() {
        let mut state = state_with(vec![make_task("t1", "b1", "todo", 0)]);
        state.apply(Action::MoveTask {
            task_id: "t1".into(),
            column_id: "done".into(),
            position: 3,
        });
        let task = state.task("t1").unwrap();
        assert_eq!(task.column_id, "done");
        assert_eq!(task.position, 3);
    }

    #[test]
    fn soft_delete_hides_task_and_restore_brings_it_back() {
        let original = make_task("t1", "b1", "todo", 0);
        let mut state = state_with(vec![original.clone()]);
        state.apply(Action::SoftDeleteTask {
            task_id: "t1".into(),
            deleted_by: "alice".into(),
            deleted_at: deleted_at(),
        });
        assert!(state.column_tasks("todo").is_empty());
        assert_eq!(state.trashed_tasks().len(), 1);
        assert_eq!(
            state.task("t1").unwrap().tombstone.as_ref().unwrap().deleted_by,
            "alice"
        );

        state.apply(Action::RestoreTask("t1".into()));
        let restored = state.task("t1").unwrap().clone();
        assert_eq!(
            Task {
                updated_at: original.updated_at,
                ..restored
            },
            original
        );
        assert!(state.trashed_tasks().is_empty());
    }

    #[test]
    fn restore_from_trash_list_moves_task_into_collection() {
        let mut trashed = make_task("t9", "b1", "todo", 0);
        trashed.tombstone = Some(Tombstone {
            deleted_at: deleted_at(),
            deleted_by: "alice".into(),
        });
        let mut state = state_with(vec![]);
        state.apply(Action::SetTrash(vec![trashed]));
        assert_eq!(state.trashed_tasks().len(), 1);

        state.apply(Action::RestoreTask("t9".into()));
        assert!(state.trash.is_empty());
        assert_eq!(state.column_tasks("todo").len(), 1);
    }

    #[test]
    fn delete_task_evicts_everywhere() {
        let mut state = state_with(vec![make_task("t1", "b1", "todo", 0)]);
        state.apply(Action::ToggleSelection {
            task_id: "t1".into(),
            column_id: "todo".into(),
        });
        state.apply(Action::DeleteTask("t1".into()));
        assert!(state.tasks.is_empty());
        assert!(state.selection.is_empty());
    }

    #[test]
    fn column_tasks_sorted_and_filtered() {
        let mut a = make_task("a", "b1", "todo", 1);
        a.title = "Write docs".into();
        let mut b = make_task("b", "b1", "todo", 0);
        b.title = "Fix bug".into();
        let mut c = make_task("c", "b1", "todo", 1);
        c.title = "Write tests".into();
        c.priority = Priority::High;
        let mut d = make_task("d", "b1", "todo", 2);
        d.archived = true;
        let mut state = state_with(vec![a, b, c, d]);

        let ids: Vec<&str> = state.column_tasks("todo").iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);

        state.apply(Action::SetSearchQuery("WRITE".into()));
        let ids: Vec<&str> = state.column_tasks("todo").iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
        assert_eq!(state.archived_tasks().len(), 1);
    }

    #[test]
    fn undo_and_redo_through_reducer() {
        let mut state = state_with(vec![
            make_task("t1", "b1", "todo", 0),
            make_task("t2", "b1", "todo", 1),
        ]);
        let initial = state.tasks.clone();
        state.apply(Action::PushHistory);
        state.apply(Action::SoftDeleteTask {
            task_id: "t1".into(),
            deleted_by: "alice".into(),
            deleted_at: deleted_at(),
        });
        let after_delete = state.tasks.clone();
        assert!(state.can_undo());

        state.apply(Action::Undo);
        assert_eq!(state.tasks, initial);
        assert!(!state.can_undo());
        assert!(state.can_redo());

        state.apply(Action::Redo);
        assert_eq!(state.tasks, after_delete);
        assert!(!state.can_redo());
    }

    #[test]
    fn view_toggles() {
        let mut state = BoardState::default();
        state.apply(Action::SetViewMode(ViewMode::Trash));
        state.apply(Action::ToggleFocusMode);
        assert_eq!(state.view_mode, ViewMode::Trash);
        assert!(state.focus_mode);
        state.apply(Action::ToggleFocusMode);
        assert!(!state.focus_mode);
    }

    #[test]
    fn set_tasks_prunes_selection() {
        let mut state = state_with(vec![make_task("t1", "b1", "todo", 0)]);
        state.apply(Action::ToggleSelection {
            task_id: "t1".into(),
            column_id: "todo".into(),
        });
        state.apply(Action::SetTasks(vec![make_task("t2", "b1", "todo", 0)]));
        assert!(state.selection.is_empty());
    }

    #[test]
    fn dispatch_publishes_each_state() {
        let mut store = TaskStore::default();
        let rx = store.subscribe();
        store.dispatch(Action::SetSearchQuery("abc".into()));
        assert_eq!(rx.borrow().search_query, "abc");
        assert_eq!(store.state().search_query, "abc");
    }
}
