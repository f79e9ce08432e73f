//! WIP limit guard. Pure predicates consulted before a task enters a column;
//! a rejection means the mutation is never attempted.

use std::collections::HashSet;

use crate::board::{Column, Task};

/// A rejected admission into a column.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("column '{column_title}' is at its WIP limit ({current}/{limit}); {incoming} more would not fit")]
pub struct WipViolation {
    pub column_id: String,
    pub column_title: String,
    pub limit: u32,
    pub current: usize,
    pub incoming: usize,
}

/// Number of non-archived, non-deleted tasks in a column.
pub fn active_count(column_id: &str, tasks: &[Task]) -> usize {
    tasks
        .iter()
        .filter(|t| t.column_id == column_id && t.is_active())
        .count()
}

/// Admit `incoming` additional active tasks into `column`.
pub fn check_capacity(column: &Column, tasks: &[Task], incoming: usize) -> Result<(), WipViolation> {
    let Some(limit) = column.wip_limit else {
        return Ok(());
    };
    if incoming == 0 {
        return Ok(());
    }
    let current = active_count(&column.id, tasks);
    if current + incoming <= limit as usize {
        Ok(())
    } else {
        Err(WipViolation {
            column_id: column.id.clone(),
            column_title: column.title.clone(),
            limit,
            current,
            incoming,
        })
    }
}

/// Single move. A task already in the column is always admissible.
pub fn check_move(column: &Column, tasks: &[Task], task_id: &str) -> Result<(), WipViolation> {
    let already_there = tasks
        .iter()
        .any(|t| t.id == task_id && t.column_id == column.id);
    if already_there {
        return Ok(());
    }
    check_capacity(column, tasks, 1)
}

/// Bulk move: the whole batch fits or none of it moves.
pub fn check_bulk_move<'a>(
    column: &Column,
    tasks: &[Task],
    task_ids: impl IntoIterator<Item = &'a str>,
) -> Result<(), WipViolation> {
    let ids: HashSet<&str> = task_ids.into_iter().collect();
    let incoming = tasks
        .iter()
        .filter(|t| ids.contains(t.id.as_str()) && t.column_id != column.id && t.is_active())
        .count();
    check_capacity(column, tasks, incoming)
}
