use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Depth of the undo history unless configured otherwise.
pub const DEFAULT_HISTORY_DEPTH: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("toml deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("history_depth must be at least 1")]
    InvalidHistoryDepth,
    #[error("column seed {0:?} has a WIP limit of 0 (omit it for unlimited)")]
    InvalidWipLimit(String),
}

/// Client configuration, read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Acting user. Overridden by `--user` / `TASKBOARD_USER`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default = "default_board_title")]
    pub board_title: String,
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
    /// Trashed tasks older than this many days are purged. 0 = disabled.
    #[serde(default = "default_trash_retention_days")]
    pub trash_retention_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    /// Columns seeded on a board that has none.
    #[serde(default = "default_columns", rename = "columns")]
    pub columns: Vec<ColumnSeed>,
}

/// A column created when a board is first seeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSeed {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<u32>,
}

impl ColumnSeed {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            wip_limit: None,
        }
    }
}

fn default_board_title() -> String {
    "My Board".to_string()
}
fn default_history_depth() -> usize {
    DEFAULT_HISTORY_DEPTH
}
fn default_trash_retention_days() -> u32 {
    30
}
fn default_columns() -> Vec<ColumnSeed> {
    ["To Do", "In Progress", "Review", "Done"]
        .into_iter()
        .map(ColumnSeed::new)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: None,
            board_title: default_board_title(),
            history_depth: default_history_depth(),
            trash_retention_days: default_trash_retention_days(),
            log_filter: None,
            columns: default_columns(),
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_depth == 0 {
            return Err(ConfigError::InvalidHistoryDepth);
        }
        if let Some(seed) = self.columns.iter().find(|c| c.wip_limit == Some(0)) {
            return Err(ConfigError::InvalidWipLimit(seed.title.clone()));
        }
        Ok(())
    }

    /// Load from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Resolve the config file: explicit path, then the board directory,
    /// then the user config directory.
    pub fn locate(explicit: Option<&Path>, board_dir: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(dir) = board_dir {
            let candidate = dir.join("config.toml");
            if candidate.exists() {
                return Some(candidate);
            }
        }
        dirs::config_dir()
            .map(|d| d.join("taskboard").join("config.toml"))
            .filter(|p| p.exists())
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
