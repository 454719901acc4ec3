//! Configuration management for Berth

pub mod schema;

pub use schema::Config;

use crate::error::{BerthError, BerthResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("berth")
            .join("config.toml")
    }

    /// Get the data directory path
    pub fn data_dir(config: &Config) -> PathBuf {
        config.app.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("berth")
        })
    }

    /// Get the cache directory path
    pub fn cache_dir(config: &Config) -> PathBuf {
        config
            .cache
            .dir
            .clone()
            .unwrap_or_else(|| Self::data_dir(config).join("cache"))
    }

    /// Get the directory generated compose files live under
    pub fn compose_dir(config: &Config) -> PathBuf {
        Self::data_dir(config).join("compose")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> BerthResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> BerthResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| BerthError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| BerthError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Ensure all state directories exist
    pub async fn ensure_state_dirs(config: &Config) -> BerthResult<()> {
        let dirs = [
            Self::data_dir(config),
            Self::cache_dir(config),
            Self::compose_dir(config),
        ];

        for dir in &dirs {
            fs::create_dir_all(dir).await.map_err(|e| {
                BerthError::io(format!("creating directory {}", dir.display()), e)
            })?;
        }

        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
