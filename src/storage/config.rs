//! Configuration handling for the task CLI
//!
//! Configuration is optional and read from `config.toml` in the platform
//! config directory (e.g. `~/.config/task-cli/config.toml`), or from the file
//! named by `$TASK_CONFIG`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "TASK_CONFIG";

const DATA_DIR_NAME: &str = ".tasks";
const DB_FILE_NAME: &str = "tasks.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not find user home directory")]
    NoHomeDir,

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// User configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `tasks.db` (defaults to `~/.tasks`)
    pub data_dir: Option<PathBuf>,

    /// How far back `task completed` looks, in hours
    pub completed_window_hours: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            completed_window_hours: 24,
        }
    }
}

impl Config {
    /// Returns the global config directory
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "task-cli").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads configuration from `$TASK_CONFIG` or the default location
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }

        match Self::config_dir() {
            Some(dir) => Self::load_from(&dir.join("config.toml")),
            None => Ok(Self::default()),
        }
    }

    /// Loads configuration from a file, defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Resolves the data directory: config value, else `~/.tasks`
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }

        let base = BaseDirs::new().ok_or(ConfigError::NoHomeDir)?;
        Ok(base.home_dir().join(DATA_DIR_NAME))
    }

    /// Path to the task database inside the data directory
    pub fn db_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(DB_FILE_NAME))
    }
}
