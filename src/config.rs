use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for a `PageStore`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the log file
    pub data_dir: PathBuf,
    pub log_file_name: String,
    /// Upper bound on files tracked open at the same time
    pub max_open_files: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            log_file_name: "db.log".to_string(),
            max_open_files: 128,
        }
    }
}

impl StoreConfig {
    /// Load a JSON config file. Missing fields fall back to their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let config: StoreConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.clone(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.log_file_name.is_empty() {
            return Err(ConfigError::Invalid(
                "log_file_name must not be empty".to_string(),
            ));
        }
        if self.max_open_files == 0 {
            return Err(ConfigError::Invalid(
                "max_open_files must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Full path of the log file
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_file_name)
    }
}
