//! Runtime factory
//!
//! Resolves the platform and the compose binary, then builds the engine and
//! compose runtimes every other layer receives.

use crate::config::Config;
use crate::error::{BerthError, BerthResult};
use crate::orchestration::compose::ComposeCli;
use crate::orchestration::engine::DockerEngine;
use crate::orchestration::runtime::{ComposeRuntime, ContainerRuntime};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// Detected platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOS,
    Linux,
    /// Linux under the Windows Subsystem for Linux
    Wsl,
    Windows,
    Unsupported,
}

impl Platform {
    /// Detect the current platform
    pub fn detect() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::MacOS,
            "linux" if Self::is_wsl() => Platform::Wsl,
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            _ => Platform::Unsupported,
        }
    }

    fn is_wsl() -> bool {
        std::fs::read_to_string("/proc/version")
            .map(|v| v.to_lowercase().contains("microsoft"))
            .unwrap_or(false)
    }

    /// Platform from config, falling back to detection
    pub fn resolve(config: &Config) -> BerthResult<Self> {
        match config.engine.platform.as_deref() {
            None => Ok(Self::detect()),
            Some("macos") | Some("darwin") => Ok(Platform::MacOS),
            Some("linux") => Ok(Platform::Linux),
            Some("wsl") => Ok(Platform::Wsl),
            Some("windows") | Some("win32") => Ok(Platform::Windows),
            Some(other) => Err(BerthError::UnsupportedPlatform(other.to_string())),
        }
    }

    /// Get a human-readable platform name
    pub fn name(&self) -> &'static str {
        match self {
            Platform::MacOS => "macOS",
            Platform::Linux => "Linux",
            Platform::Wsl => "WSL",
            Platform::Windows => "Windows",
            Platform::Unsupported => "Unsupported",
        }
    }

    /// Value exported to containers as the host OS
    pub fn host_os(&self) -> &'static str {
        match self {
            Platform::MacOS => "darwin",
            Platform::Linux | Platform::Wsl => "linux",
            Platform::Windows => "win32",
            Platform::Unsupported => "unknown",
        }
    }
}

/// Engine and compose runtimes for one process
#[derive(Clone)]
pub struct Runtimes {
    pub platform: Platform,
    pub engine: Arc<dyn ContainerRuntime>,
    pub compose: Arc<dyn ComposeRuntime>,
}

async fn succeeds(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Resolve the compose binary: configured path, `<engine> compose`, then `docker-compose`
pub async fn detect_compose(config: &Config) -> BerthResult<ComposeCli> {
    if let Some(bin) = &config.engine.compose_bin {
        debug!("Using configured compose binary {}", bin.display());
        return Ok(ComposeCli::new(bin.clone(), Vec::new()));
    }

    let engine = config.engine.engine_bin.as_str();
    if succeeds(engine, &["compose", "version"]).await {
        debug!("Using {} compose", engine);
        return Ok(ComposeCli::new(engine, vec!["compose".to_string()]));
    }

    if succeeds("docker-compose", &["--version"]).await {
        debug!("Using docker-compose");
        return Ok(ComposeCli::new("docker-compose", Vec::new()));
    }

    Err(BerthError::ComposeNotFound)
}

/// Create the runtimes appropriate for this host
pub async fn create_runtimes(config: &Config) -> BerthResult<Runtimes> {
    let platform = Platform::resolve(config)?;
    if platform == Platform::Unsupported {
        return Err(BerthError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        ));
    }

    let engine = DockerEngine::new(&config.engine.engine_bin, &config.engine.instance);
    let compose = detect_compose(config).await?;

    Ok(Runtimes {
        platform,
        engine: Arc::new(engine),
        compose: Arc::new(compose),
    })
}
