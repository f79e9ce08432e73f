use std::collections::BTreeSet;

/// Tasks marked for a bulk operation. All members come from one column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    column_id: Option<String>,
    task_ids: BTreeSet<String>,
}

impl Selection {
    pub fn column_id(&self) -> Option<&str> {
        self.column_id.as_deref()
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.task_ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.task_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_ids.is_empty()
    }

    /// Toggle a task. Selecting from a different column collapses the set
    /// to just that task.
    pub fn toggle(&mut self, task_id: &str, column_id: &str) {
        if self.column_id.as_deref() != Some(column_id) {
            self.task_ids.clear();
            self.task_ids.insert(task_id.to_string());
            self.column_id = Some(column_id.to_string());
            return;
        }
        if !self.task_ids.remove(task_id) {
            self.task_ids.insert(task_id.to_string());
        }
        if self.task_ids.is_empty() {
            self.column_id = None;
        }
    }

    /// Drop ids no longer present, e.g. after a reload.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.task_ids.retain(|id| keep(id));
        if self.task_ids.is_empty() {
            self.column_id = None;
        }
    }

    pub fn clear(&mut self) {
        self.task_ids.clear();
        self.column_id = None;
    }
}
