//! Configuration for course-roster

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::RosterError;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("course-roster")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the SQLite database
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Database file name inside `storage_dir`
    #[serde(default = "default_db_file")]
    pub db_file: String,

    /// Run each request's write and its reconciliation in one transaction.
    /// When false a failed reconciliation leaves earlier steps committed.
    #[serde(default)]
    pub atomic_requests: bool,

    /// Capacity of the audit notification channel
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,
}

fn default_db_file() -> String {
    "roster.db".to_string()
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            db_file: default_db_file(),
            atomic_requests: false,
            event_channel_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RosterError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| RosterError::Config(e.to_string()))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RosterError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| RosterError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> PathBuf {
        self.storage_dir.join(&self.db_file)
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("atomic_requests = true").unwrap();
        assert!(config.atomic_requests);
        assert_eq!(config.db_file, "roster.db");
        assert_eq!(config.event_channel_capacity, 1024);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            storage_dir: temp.path().to_path_buf(),
            db_file: "courses.db".into(),
            atomic_requests: true,
            event_channel_capacity: 16,
        };

        let path = config.config_path();
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();

        assert_eq!(loaded.db_path(), temp.path().join("courses.db"));
        assert!(loaded.atomic_requests);
        assert_eq!(loaded.event_channel_capacity, 16);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "atomic_requests = \"maybe\"").unwrap();

        assert!(matches!(Config::load(&path), Err(RosterError::Config(_))));
    }
}
