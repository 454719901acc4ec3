//! Error types for Berth
//!
//! All modules use `BerthResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Berth operations
pub type BerthResult<T> = Result<T, BerthError>;

/// All errors that can occur in Berth
#[derive(Error, Debug)]
pub enum BerthError {
    // Environment errors
    #[error("Container engine not found: {0}")]
    EngineNotFound(String),

    #[error("No compose binary found. Install the docker compose plugin or set engine.compose_bin")]
    ComposeNotFound,

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("No app found in {0} or any parent directory")]
    AppNotFound(PathBuf),

    #[error("Service {0} is declared more than once")]
    DuplicateService(String),

    #[error("Invalid directive: {0}")]
    InvalidDirective(String),

    #[error("Unknown lifecycle phase: {0}")]
    UnknownPhase(String),

    #[error("Compose files for {0} are out of date with its services")]
    StaleComposeUnits(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    // Runtime errors
    #[error("{command} failed with exit code {code}: {stderr}")]
    RuntimeCommand {
        command: String,
        stdout: String,
        stderr: String,
        code: i32,
    },

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    // Orchestration errors
    #[error("{} of {total} orchestration steps failed; first error: {}", .errors.len(), first_error(.errors))]
    PartialFailure {
        total: usize,
        errors: Vec<BerthError>,
    },

    // Lifecycle errors
    #[error("{handler} failed during {phase}: {source}")]
    PhaseFailed {
        phase: String,
        handler: String,
        #[source]
        source: Box<BerthError>,
    },

    // Cache errors
    #[error("Invalid cache key {key}: {reason}")]
    CacheKeyInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

fn first_error(errors: &[BerthError]) -> String {
    errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl BerthError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error (the process could not be spawned)
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create an error for a runtime command that exited non-zero
    pub fn runtime_command(
        command: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        code: i32,
    ) -> Self {
        Self::RuntimeCommand {
            command: command.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            code,
        }
    }

    /// Exit code of the underlying runtime command, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::RuntimeCommand { code, .. } => Some(*code),
            Self::PhaseFailed { source, .. } => source.exit_code(),
            Self::PartialFailure { errors, .. } => errors.iter().find_map(|e| e.exit_code()),
            _ => None,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::EngineNotFound(_) => Some("Is docker installed and running? Try: docker info"),
            Self::ComposeNotFound => Some("Install it from https://docs.docker.com/compose/install/"),
            Self::AppNotFound(_) => Some("Create a .berth.toml in your project root"),
            Self::StaleComposeUnits(_) => Some("Run: berth rebuild"),
            Self::PhaseFailed { source, .. } => source.hint(),
            _ => None,
        }
    }
}
