use std::sync::Arc;

use crate::board::Task;
use crate::config::DEFAULT_HISTORY_DEPTH;

/// Immutable point-in-time copy of the task collection.
pub type Snapshot = Arc<[Task]>;

/// Bounded linear undo/redo stack of task-collection snapshots.
///
/// `cursor` ranges over `0..=len`. When it equals `len` the live collection
/// is newer than every stored snapshot; undo first records the live state so
/// that redo can come back to it. That extra entry counts against `depth`
/// too, so the depth is at least two: one target plus the live state.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Snapshot>,
    cursor: usize,
    depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl History {
    pub fn new(depth: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            depth: depth.max(2),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Record the pre-mutation collection. Drops any redo tail.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.entries.truncate(self.cursor);
        self.entries.push(snapshot);
        if self.entries.len() > self.depth {
            let excess = self.entries.len() - self.depth;
            self.entries.drain(..excess);
        }
        self.cursor = self.entries.len();
    }

    /// Step back one snapshot. `live` is the collection currently shown.
    pub fn undo(&mut self, live: &[Task]) -> Option<Snapshot> {
        if self.cursor == 0 {
            return None;
        }
        if self.cursor == self.entries.len() {
            self.entries.push(Arc::from(live));
            if self.entries.len() > self.depth {
                self.entries.remove(0);
                self.cursor -= 1;
            }
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    pub fn redo(&mut self) -> Option<Snapshot> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor).cloned()
    }

    /// Drop a task from every snapshot so undo cannot bring back a task
    /// that no longer exists anywhere.
    pub fn forget(&mut self, task_id: &str) {
        for entry in &mut self.entries {
            if entry.iter().any(|t| t.id == task_id) {
                let kept: Vec<Task> = entry.iter().filter(|t| t.id != task_id).cloned().collect();
                *entry = Arc::from(kept);
            }
        }
    }
}
