//! Configuration schema for Berth
//!
//! Configuration is stored at `~/.config/berth/config.toml`. Every value a
//! process needs about its host (platform, engine binaries, instance id)
//! lives here and is threaded through explicitly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Container engine settings
    pub engine: EngineConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// App discovery settings
    pub app: AppSettings,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Tool version recorded as `built_against` (defaults to the crate version)
    pub version: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            version: None,
        }
    }
}

/// Container engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Container engine binary
    pub engine_bin: String,

    /// Explicit compose binary; detected from the engine when unset
    pub compose_bin: Option<PathBuf>,

    /// Platform override ("linux", "macos", "windows", "wsl")
    pub platform: Option<String>,

    /// Instance id stamped on every container this install manages
    pub instance: String,

    /// Name of the shared bridge network apps join
    pub bridge_network: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_bin: "docker".to_string(),
            compose_bin: None,
            platform: None,
            instance: "berth".to_string(),
            bridge_network: "berth_bridge_network".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory override
    pub dir: Option<PathBuf>,

    /// Default time-to-live for entries in seconds (0 = no expiry)
    pub default_ttl_secs: u64,
}

/// App discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// App file name searched for from the working directory upwards
    pub file_name: String,

    /// Data directory override (compose files live under `<data_dir>/compose`)
    pub data_dir: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            file_name: ".berth.toml".to_string(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Version recorded against builds
    pub fn version(&self) -> String {
        self.general
            .version
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[engine]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.engine.engine_bin, "docker");
        assert_eq!(config.app.file_name, ".berth.toml");
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [engine]
            instance = "work"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.engine.instance, "work");
        assert_eq!(config.engine.engine_bin, "docker"); // default preserved
    }

    #[test]
    fn version_override() {
        let mut config = Config::default();
        assert_eq!(config.version(), env!("CARGO_PKG_VERSION"));
        config.general.version = Some("9.9.9".to_string());
        assert_eq!(config.version(), "9.9.9");
    }
}
