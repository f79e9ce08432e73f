pub mod defaults;
pub mod storage;

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single owner's workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Semantic role of a column, assigned once when the column is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnRole {
    Backlog,
    InProgress,
    Review,
    Done,
    Archive,
    #[default]
    Custom,
}

impl ColumnRole {
    /// Derive the role from a column title (case-insensitive, trimmed).
    pub fn from_title(title: &str) -> Self {
        match normalize_title(title).as_str() {
            "to do" | "todo" | "to-do" | "backlog" => Self::Backlog,
            "in progress" | "in-progress" | "doing" => Self::InProgress,
            "review" | "in review" => Self::Review,
            "done" => Self::Done,
            "archive" | "archived" => Self::Archive,
            _ => Self::Custom,
        }
    }
}

/// Lowercase and trim a title for semantic comparison.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// A column on exactly one board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub board_id: String,
    pub title: String,
    #[serde(default)]
    pub role: ColumnRole,
    pub position: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<u32>,
}

impl Column {
    pub fn new(id: String, board_id: String, title: String, position: u32) -> Self {
        let role = ColumnRole::from_title(&title);
        Self {
            id,
            board_id,
            title,
            role,
            position,
            wip_limit: None,
        }
    }

    /// Case-insensitive title comparison.
    pub fn title_matches(&self, other: &str) -> bool {
        normalize_title(&self.title) == normalize_title(other)
    }
}

/// Priority levels for tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Sort key: lower = higher priority (sorts first).
    pub fn sort_key(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority '{other}': use low, medium, high")),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Soft-delete marker. Present means the task is in the trash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub deleted_at: DateTime<Utc>,
    pub deleted_by: String,
}

/// The mutable unit of work. `board_id` is the owning board; `column_id`
/// always names a column of that board once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub board_id: String,
    pub column_id: String,
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tombstone: Option<Tombstone>,
    #[serde(default)]
    pub assignees: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_deleted(&self) -> bool {
        self.tombstone.is_some()
    }

    /// Counts toward a column's WIP limit.
    pub fn is_active(&self) -> bool {
        !self.archived && !self.is_deleted()
    }

    /// Touch the task, updating its `updated_at` timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Apply a partial patch in place. Returns true if any field was set.
    pub fn apply_patch(&mut self, patch: &TaskPatch) -> bool {
        let mut changed = false;
        if let Some(title) = &patch.title {
            self.title = title.clone();
            changed = true;
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
            changed = true;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
            changed = true;
        }
        if let Some(due) = patch.due_date {
            self.due_date = due;
            changed = true;
        }
        if let Some(column_id) = &patch.column_id {
            self.column_id = column_id.clone();
            changed = true;
        }
        if let Some(position) = patch.position {
            self.position = position;
            changed = true;
        }
        if let Some(archived) = patch.archived {
            self.archived = archived;
            changed = true;
        }
        if let Some(tombstone) = &patch.tombstone {
            self.tombstone = tombstone.clone();
            changed = true;
        }
        if let Some(assignees) = &patch.assignees {
            self.assignees = assignees.clone();
            changed = true;
        }
        if changed {
            self.touch();
        }
        changed
    }

    /// Assignees in `self` that are not in `previous`.
    pub fn added_assignees<'a>(&'a self, previous: &[String]) -> Vec<&'a str> {
        let before: HashSet<&str> = previous.iter().map(String::as_str).collect();
        self.assignees
            .iter()
            .map(String::as_str)
            .filter(|a| !before.contains(a))
            .collect()
    }
}

/// Input for creating a task. `column_id` and the owning board are resolved
/// by the caller; the gateway rejects a create where either is missing.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub column_id: Option<String>,
    pub assignees: Vec<String>,
}

/// Partial field patch sent to the remote. `None` leaves a field untouched;
/// the doubly-wrapped options distinguish "clear" from "leave".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub column_id: Option<String>,
    pub position: Option<u32>,
    pub archived: Option<bool>,
    pub tombstone: Option<Option<Tombstone>>,
    pub assignees: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn moved(column_id: &str, position: u32) -> Self {
        Self {
            column_id: Some(column_id.to_string()),
            position: Some(position),
            ..Default::default()
        }
    }

    /// Patch carrying every field that differs between `before` and `after`
    /// among the fields history can restore.
    pub fn diff(before: &Task, after: &Task) -> Self {
        let mut patch = Self::default();
        if before.column_id != after.column_id {
            patch.column_id = Some(after.column_id.clone());
        }
        if before.position != after.position {
            patch.position = Some(after.position);
        }
        if before.priority != after.priority {
            patch.priority = Some(after.priority);
        }
        if before.archived != after.archived {
            patch.archived = Some(after.archived);
        }
        if before.tombstone != after.tombstone {
            patch.tombstone = Some(after.tombstone.clone());
        }
        patch
    }
}

/// User-editable content of a task. Location, archive state and tombstone
/// change only through their own operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub assignees: Option<Vec<String>>,
}

impl From<TaskEdit> for TaskPatch {
    fn from(edit: TaskEdit) -> Self {
        Self {
            title: edit.title,
            description: edit.description,
            priority: edit.priority,
            due_date: edit.due_date,
            assignees: edit.assignees,
            ..Default::default()
        }
    }
}

/// Column settings patch. Titles are immutable once created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnPatch {
    pub position: Option<u32>,
    pub wip_limit: Option<Option<u32>>,
}

/// Outbound notification record for an assignee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: String,
    pub task_id: String,
    pub board_id: String,
    pub message: String,
}

/// Sort tasks of one column: position, then priority (high first), then
/// insertion order. The sort is stable so equal keys keep their order.
pub fn sort_column_tasks(tasks: &mut [&Task]) {
    tasks.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then(a.priority.sort_key().cmp(&b.priority.sort_key()))
    });
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn make_task(id: &str, board_id: &str, column_id: &str, position: u32) -> Task {
        let at = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        Task {
            id: id.into(),
            board_id: board_id.into(),
            column_id: column_id.into(),
            owner_id: "alice".into(),
            title: format!("Task {id}"),
            description: String::new(),
            priority: Priority::Medium,
            due_date: None,
            position,
            archived: false,
            tombstone: None,
            assignees: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn role_from_title_is_case_insensitive() {
        assert_eq!(ColumnRole::from_title("To Do"), ColumnRole::Backlog);
        assert_eq!(ColumnRole::from_title("  TODO "), ColumnRole::Backlog);
        assert_eq!(ColumnRole::from_title("In Progress"), ColumnRole::InProgress);
        assert_eq!(ColumnRole::from_title("REVIEW"), ColumnRole::Review);
        assert_eq!(ColumnRole::from_title("Done"), ColumnRole::Done);
        assert_eq!(ColumnRole::from_title("Archive"), ColumnRole::Archive);
        assert_eq!(ColumnRole::from_title("Blocked"), ColumnRole::Custom);
    }

    #[test]
    fn priority_parse_and_display() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(Priority::Low.to_string(), "low");
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn sort_by_position_then_priority() {
        let mut a = make_task("a", "b1", "c1", 1);
        a.priority = Priority::Low;
        let mut b = make_task("b", "b1", "c1", 1);
        b.priority = Priority::High;
        let c = make_task("c", "b1", "c1", 0);
        let d = make_task("d", "b1", "c1", 1);
        let mut refs = vec![&a, &b, &c, &d];
        sort_column_tasks(&mut refs);
        let ids: Vec<&str> = refs.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "d", "a"]);
    }

    #[test]
    fn apply_patch_sets_only_given_fields() {
        let mut task = make_task("t", "b1", "c1", 0);
        let before = task.updated_at;
        assert!(!task.apply_patch(&TaskPatch::default()));
        assert_eq!(task.updated_at, before);

        let patch = TaskPatch {
            priority: Some(Priority::High),
            due_date: Some(NaiveDate::from_ymd_opt(2025, 7, 1)),
            ..Default::default()
        };
        assert!(task.apply_patch(&patch));
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2025, 7, 1));
        assert_eq!(task.title, "Task t");
    }

    #[test]
    fn added_assignees_ignores_existing() {
        let mut task = make_task("t", "b1", "c1", 0);
        task.assignees = vec!["bob".into(), "carol".into()];
        assert_eq!(task.added_assignees(&["bob".to_string()]), vec!["carol"]);
    }

    #[test]
    fn diff_covers_history_fields() {
        let before = make_task("t", "b1", "c1", 0);
        let mut after = before.clone();
        after.column_id = "c2".into();
        after.tombstone = Some(Tombstone {
            deleted_at: before.created_at,
            deleted_by: "alice".into(),
        });
        let patch = TaskPatch::diff(&before, &after);
        assert_eq!(patch.column_id.as_deref(), Some("c2"));
        assert_eq!(patch.tombstone, Some(after.tombstone.clone()));
        assert!(patch.position.is_none());
        assert!(TaskPatch::diff(&before, &before).is_empty());
    }
}
