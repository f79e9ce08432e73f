use uuid::Uuid;

use super::Column;
use crate::config::ColumnSeed;

/// Build the seeded column set for a board, ordered as given.
pub fn seed_columns(board_id: &str, seeds: &[ColumnSeed]) -> Vec<Column> {
    seeds
        .iter()
        .enumerate()
        .map(|(idx, seed)| {
            let mut col = Column::new(
                new_id(),
                board_id.to_string(),
                seed.title.clone(),
                idx as u32,
            );
            col.wip_limit = seed.wip_limit;
            col
        })
        .collect()
}

/// Fresh identifier for boards, columns and tasks.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
