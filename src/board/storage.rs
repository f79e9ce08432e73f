//! File-backed remote for the command-line client.
//!
//! Layout under a `.taskboard/` directory:
//!
//! ```text
//! .taskboard/
//!   boards.toml          [[boards]] entries
//!   columns.toml         [[columns]] entries for every board
//!   tasks/<id>.md        TOML frontmatter + description body
//!   notifications.jsonl  one JSON record per line
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use super::defaults::{new_id, seed_columns};
use super::{Board, Column, ColumnPatch, Notification, Priority, Task, TaskPatch, Tombstone};
use crate::config::ColumnSeed;
use crate::remote::{Remote, RemoteError, RemoteResult};

pub const BOARD_DIR: &str = ".taskboard";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("toml deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(".taskboard directory not found (walk up from {0})")]
    NotFound(PathBuf),
    #[error("invalid task file {path}: {reason}")]
    InvalidTask { path: PathBuf, reason: String },
}

impl From<StorageError> for RemoteError {
    fn from(e: StorageError) -> Self {
        RemoteError::Storage(e.to_string())
    }
}

/// Find the board directory by walking up from `start`.
pub fn find_board_dir(start: &Path) -> Result<PathBuf, StorageError> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(BOARD_DIR);
        if candidate.is_dir() {
            return Ok(candidate);
        }
        if !dir.pop() {
            return Err(StorageError::NotFound(start.to_path_buf()));
        }
    }
}

/// Create an empty board directory under `root`. Existing data is kept.
pub fn init_board_dir(root: &Path) -> Result<PathBuf, StorageError> {
    let dir = root.join(BOARD_DIR);
    fs::create_dir_all(dir.join("tasks"))?;
    Ok(dir)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BoardsFile {
    #[serde(default)]
    boards: Vec<Board>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ColumnsFile {
    #[serde(default)]
    columns: Vec<Column>,
}

/// Task fields stored in the frontmatter. The description is the body.
#[derive(Debug, Serialize, Deserialize)]
struct TaskFrontmatter {
    id: String,
    board_id: String,
    column_id: String,
    owner_id: String,
    title: String,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    position: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    archived: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    assignees: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_by: Option<String>,
}

impl TaskFrontmatter {
    fn from_task(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            board_id: task.board_id.clone(),
            column_id: task.column_id.clone(),
            owner_id: task.owner_id.clone(),
            title: task.title.clone(),
            priority: task.priority,
            position: task.position,
            due_date: task.due_date,
            archived: task.archived,
            assignees: task.assignees.clone(),
            created_at: task.created_at,
            updated_at: task.updated_at,
            deleted_at: task.tombstone.as_ref().map(|t| t.deleted_at),
            deleted_by: task.tombstone.as_ref().map(|t| t.deleted_by.clone()),
        }
    }

    fn into_task(self, description: String) -> Task {
        let tombstone = match (self.deleted_at, self.deleted_by) {
            (Some(deleted_at), Some(deleted_by)) => Some(Tombstone {
                deleted_at,
                deleted_by,
            }),
            _ => None,
        };
        Task {
            id: self.id,
            board_id: self.board_id,
            column_id: self.column_id,
            owner_id: self.owner_id,
            title: self.title,
            description,
            priority: self.priority,
            due_date: self.due_date,
            position: self.position,
            archived: self.archived,
            tombstone,
            assignees: self.assignees,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Serialize a task to the frontmatter + markdown body format.
///
/// A non-empty description follows one blank line and gets one closing
/// newline, both stripped again by [`parse_frontmatter`].
fn serialize_task(task: &Task) -> Result<String, StorageError> {
    let fm = toml::to_string(&TaskFrontmatter::from_task(task))?;
    let mut out = format!("---\n{fm}---\n");
    if !task.description.is_empty() {
        out.push('\n');
        out.push_str(&task.description);
        out.push('\n');
    }
    Ok(out)
}

/// Split a task file into (frontmatter, body). `\r\n` is read as `\n`.
fn parse_frontmatter(content: &str) -> Option<(String, String)> {
    let content = content.replace("\r\n", "\n");
    let rest = content.trim_start().strip_prefix("---\n")?;
    let (frontmatter, body) = match rest.split_once("\n---\n") {
        Some(parts) => parts,
        None => (rest.strip_suffix("\n---")?, ""),
    };
    let body = body.strip_prefix('\n').unwrap_or(body);
    let body = body.strip_suffix('\n').unwrap_or(body);
    Some((frontmatter.to_string(), body.to_string()))
}

fn load_task(path: &Path) -> Result<Task, StorageError> {
    let content = fs::read_to_string(path)?;
    let (frontmatter, body) = parse_frontmatter(&content).ok_or_else(|| StorageError::InvalidTask {
        path: path.to_path_buf(),
        reason: "missing or invalid TOML frontmatter".into(),
    })?;
    let fm: TaskFrontmatter = toml::from_str(&frontmatter).map_err(|e| StorageError::InvalidTask {
        path: path.to_path_buf(),
        reason: format!("invalid TOML: {e}"),
    })?;
    Ok(fm.into_task(body))
}

/// Ids become file names; anything else is refused.
fn safe_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Synchronous file operations. One instance per board directory.
struct Files {
    dir: PathBuf,
}

impl Files {
    fn boards_path(&self) -> PathBuf {
        self.dir.join("boards.toml")
    }

    fn columns_path(&self) -> PathBuf {
        self.dir.join("columns.toml")
    }

    fn tasks_dir(&self) -> PathBuf {
        self.dir.join("tasks")
    }

    fn task_path(&self, id: &str) -> Result<PathBuf, StorageError> {
        if !safe_id(id) {
            return Err(StorageError::InvalidTask {
                path: self.tasks_dir(),
                reason: format!("unsafe task id: {id:?}"),
            });
        }
        Ok(self.tasks_dir().join(format!("{id}.md")))
    }

    fn load_boards(&self) -> Result<Vec<Board>, StorageError> {
        match fs::read_to_string(self.boards_path()) {
            Ok(s) => Ok(toml::from_str::<BoardsFile>(&s)?.boards),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save_boards(&self, boards: Vec<Board>) -> Result<(), StorageError> {
        let s = toml::to_string_pretty(&BoardsFile { boards })?;
        fs::write(self.boards_path(), s)?;
        Ok(())
    }

    fn load_columns(&self) -> Result<Vec<Column>, StorageError> {
        match fs::read_to_string(self.columns_path()) {
            Ok(s) => Ok(toml::from_str::<ColumnsFile>(&s)?.columns),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save_columns(&self, columns: Vec<Column>) -> Result<(), StorageError> {
        let s = toml::to_string_pretty(&ColumnsFile { columns })?;
        fs::write(self.columns_path(), s)?;
        Ok(())
    }

    /// Every readable task. Unparseable files are skipped with a warning.
    fn load_tasks(&self) -> Result<Vec<Task>, StorageError> {
        let dir = self.tasks_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut tasks = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            match load_task(&path) {
                Ok(task) => tasks.push(task),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping invalid task file"),
            }
        }
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    fn read_task(&self, id: &str) -> Result<Option<Task>, StorageError> {
        let path = self.task_path(id)?;
        if !path.exists() {
            return Ok(None);
        }
        load_task(&path).map(Some)
    }

    fn write_task(&self, task: &Task) -> Result<(), StorageError> {
        let path = self.task_path(&task.id)?;
        fs::create_dir_all(self.tasks_dir())?;
        fs::write(path, serialize_task(task)?)?;
        Ok(())
    }

    fn append_notification(&self, notification: &Notification) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(notification)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join("notifications.jsonl"))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// [`Remote`] over a local board directory. A mutex serializes file access
/// so concurrent callers never interleave read-modify-write cycles.
pub struct FileRemote {
    files: Mutex<Files>,
}

impl FileRemote {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            files: Mutex::new(Files { dir: dir.into() }),
        }
    }

    /// Recorded notifications, oldest first.
    pub async fn notifications(&self) -> RemoteResult<Vec<Notification>> {
        let files = self.files.lock().await;
        let path = files.dir.join("notifications.jsonl");
        let content = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::from(e).into()),
        };
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(|e| RemoteError::from(StorageError::from(e))))
            .collect()
    }
}

#[async_trait]
impl Remote for FileRemote {
    async fn get_or_create_board(&self, owner_id: &str, title: &str) -> RemoteResult<Board> {
        let files = self.files.lock().await;
        let mut boards = files.load_boards()?;
        if let Some(board) = boards.iter().find(|b| b.owner_id == owner_id) {
            return Ok(board.clone());
        }
        let board = Board {
            id: new_id(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            created_at: Utc::now(),
        };
        boards.push(board.clone());
        files.save_boards(boards)?;
        Ok(board)
    }

    async fn list_columns(&self, board_id: &str) -> RemoteResult<Vec<Column>> {
        let files = self.files.lock().await;
        let mut columns: Vec<Column> = files
            .load_columns()?
            .into_iter()
            .filter(|c| c.board_id == board_id)
            .collect();
        columns.sort_by_key(|c| c.position);
        Ok(columns)
    }

    async fn create_default_columns(
        &self,
        board_id: &str,
        seeds: &[ColumnSeed],
    ) -> RemoteResult<Vec<Column>> {
        let files = self.files.lock().await;
        let mut all = files.load_columns()?;
        let seeded = seed_columns(board_id, seeds);
        all.extend(seeded.iter().cloned());
        files.save_columns(all)?;
        Ok(seeded)
    }

    async fn update_column(&self, column_id: &str, patch: &ColumnPatch) -> RemoteResult<Column> {
        let files = self.files.lock().await;
        let mut all = files.load_columns()?;
        let column = all
            .iter_mut()
            .find(|c| c.id == column_id)
            .ok_or_else(|| RemoteError::column_not_found(column_id))?;
        if let Some(position) = patch.position {
            column.position = position;
        }
        if let Some(limit) = patch.wip_limit {
            column.wip_limit = limit;
        }
        let updated = column.clone();
        files.save_columns(all)?;
        Ok(updated)
    }

    async fn get_column(&self, column_id: &str) -> RemoteResult<Option<Column>> {
        let files = self.files.lock().await;
        Ok(files.load_columns()?.into_iter().find(|c| c.id == column_id))
    }

    async fn create_task(&self, task: &Task) -> RemoteResult<Task> {
        let files = self.files.lock().await;
        if files.read_task(&task.id)?.is_some() {
            return Err(RemoteError::Conflict {
                kind: "task",
                id: task.id.clone(),
            });
        }
        files.write_task(task)?;
        Ok(task.clone())
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> RemoteResult<Task> {
        let files = self.files.lock().await;
        let mut task = files
            .read_task(task_id)?
            .ok_or_else(|| RemoteError::task_not_found(task_id))?;
        task.apply_patch(patch);
        files.write_task(&task)?;
        Ok(task)
    }

    async fn delete_task(&self, task_id: &str) -> RemoteResult<()> {
        let files = self.files.lock().await;
        let path = files.task_path(task_id)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RemoteError::task_not_found(task_id)),
            Err(e) => Err(StorageError::from(e).into()),
        }
    }

    async fn list_tasks_by_board(&self, board_id: &str) -> RemoteResult<Vec<Task>> {
        let files = self.files.lock().await;
        Ok(files
            .load_tasks()?
            .into_iter()
            .filter(|t| t.board_id == board_id)
            .collect())
    }

    async fn list_tasks_by_assignee(&self, user_id: &str) -> RemoteResult<Vec<Task>> {
        let files = self.files.lock().await;
        Ok(files
            .load_tasks()?
            .into_iter()
            .filter(|t| t.assignees.iter().any(|a| a == user_id))
            .collect())
    }

    async fn create_notification(&self, notification: &Notification) -> RemoteResult<()> {
        let files = self.files.lock().await;
        files.append_notification(notification)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::make_task;
    use crate::config::Config;
    use tempfile::TempDir;

    fn remote() -> (TempDir, FileRemote) {
        let tmp = TempDir::new().unwrap();
        let dir = init_board_dir(tmp.path()).unwrap();
        (tmp, FileRemote::open(dir))
    }

    #[test]
    fn find_board_dir_walks_up() {
        let tmp = TempDir::new().unwrap();
        let dir = init_board_dir(tmp.path()).unwrap();
        let nested = tmp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_board_dir(&nested).unwrap(), dir);
    }

    #[test]
    fn find_board_dir_reports_missing() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            find_board_dir(tmp.path()),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn frontmatter_parses_body_and_crlf() {
        let (fm, body) = parse_frontmatter("---\r\nid = \"x\"\r\n---\r\n\r\nHello\r\n").unwrap();
        assert_eq!(fm, "id = \"x\"");
        assert_eq!(body, "Hello");
        assert!(parse_frontmatter("no frontmatter").is_none());
    }

    #[tokio::test]
    async fn description_whitespace_survives_a_write() {
        let (_tmp, remote) = remote();
        let mut task = make_task("t1", "b1", "c1", 0);
        task.description = "  indented\n\ntrailing blank\n\n".into();
        remote.create_task(&task).await.unwrap();
        let listed = remote.list_tasks_by_board("b1").await.unwrap();
        assert_eq!(listed[0].description, task.description);

        remote.create_task(&make_task("t2", "b1", "c1", 1)).await.unwrap();
        let empty = remote.list_tasks_by_board("b1").await.unwrap();
        assert!(empty.iter().all(|t| t.id == "t1" || t.description.is_empty()));
    }

    #[tokio::test]
    async fn task_file_keeps_every_field() {
        let (_tmp, remote) = remote();
        let mut task = make_task("t1", "b1", "c1", 2);
        task.description = "Line one\n\nLine two".into();
        task.priority = Priority::High;
        task.due_date = NaiveDate::from_ymd_opt(2025, 7, 1);
        task.assignees = vec!["bob".into()];
        task.tombstone = Some(Tombstone {
            deleted_at: task.created_at,
            deleted_by: "alice".into(),
        });
        remote.create_task(&task).await.unwrap();

        let listed = remote.list_tasks_by_board("b1").await.unwrap();
        assert_eq!(listed, [task.clone()]);
        assert_eq!(remote.list_tasks_by_assignee("bob").await.unwrap().len(), 1);
        assert!(matches!(
            remote.create_task(&task).await,
            Err(RemoteError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn update_and_delete_task() {
        let (_tmp, remote) = remote();
        remote.create_task(&make_task("t1", "b1", "c1", 0)).await.unwrap();
        let updated = remote
            .update_task("t1", &TaskPatch::moved("c2", 5))
            .await
            .unwrap();
        assert_eq!(updated.column_id, "c2");
        assert_eq!(remote.list_tasks_by_board("b1").await.unwrap()[0].position, 5);

        remote.delete_task("t1").await.unwrap();
        assert_eq!(
            remote.delete_task("t1").await,
            Err(RemoteError::task_not_found("t1"))
        );
        assert!(remote.list_tasks_by_board("b1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn boards_and_columns_persist() {
        let (tmp, remote) = remote();
        let board = remote.get_or_create_board("alice", "Alice").await.unwrap();
        let cols = remote
            .create_default_columns(&board.id, &Config::default().columns)
            .await
            .unwrap();
        remote
            .update_column(
                &cols[3].id,
                &ColumnPatch {
                    wip_limit: Some(Some(2)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let reopened = FileRemote::open(tmp.path().join(BOARD_DIR));
        let again = reopened.get_or_create_board("alice", "Other").await.unwrap();
        assert_eq!(again, board);
        let listed = reopened.list_columns(&board.id).await.unwrap();
        assert_eq!(listed.len(), 4);
        assert_eq!(listed[3].wip_limit, Some(2));
        assert_eq!(
            reopened.get_column(&cols[0].id).await.unwrap().unwrap().title,
            "To Do"
        );
    }

    #[tokio::test]
    async fn invalid_task_files_are_skipped() {
        let (tmp, remote) = remote();
        remote.create_task(&make_task("ok", "b1", "c1", 0)).await.unwrap();
        fs::write(tmp.path().join(BOARD_DIR).join("tasks").join("bad.md"), "garbage").unwrap();
        assert_eq!(remote.list_tasks_by_board("b1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unsafe_ids_are_refused() {
        let (_tmp, remote) = remote();
        let task = make_task("../escape", "b1", "c1", 0);
        assert!(matches!(
            remote.create_task(&task).await,
            Err(RemoteError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn notifications_append_as_json_lines() {
        let (_tmp, remote) = remote();
        for user in ["bob", "carol"] {
            remote
                .create_notification(&Notification {
                    user_id: user.into(),
                    task_id: "t1".into(),
                    board_id: "b1".into(),
                    message: "assigned".into(),
                })
                .await
                .unwrap();
        }
        let users: Vec<String> = remote
            .notifications()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.user_id)
            .collect();
        assert_eq!(users, ["bob", "carol"]);
    }
}
