//! Container runtime abstraction
//!
//! Two seams: [`ContainerRuntime`] talks to the engine about individual
//! containers and networks, [`ComposeRuntime`] runs compose-style
//! invocations against a project.

use crate::error::{BerthError, BerthResult};
use crate::orchestration::build_error_output;
use crate::orchestration::compose::ComposeInvocation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Captured result of one runtime process invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Command line, for diagnostics
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Turn a non-zero exit into [`BerthError::RuntimeCommand`] unless ignored
    pub fn into_result(self, ignore_return_code: bool) -> BerthResult<Self> {
        if self.success() || ignore_return_code {
            return Ok(self);
        }
        Err(BerthError::runtime_command(
            self.command,
            self.stdout,
            build_error_output("", &self.stderr),
            self.code,
        ))
    }
}

/// A container as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    /// Compose project the container belongs to
    pub project: Option<String>,
    /// Compose service the container runs
    pub service: Option<String>,
    pub status: String,
    pub running: bool,
}

/// Filters for [`ContainerRuntime::list`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Include stopped containers
    pub all: bool,
    /// Only containers of this compose project
    pub project: Option<String>,
}

/// Abstract container engine interface
///
/// Only containers carrying this install's instance label are visible.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check if the engine is reachable
    async fn is_available(&self) -> BerthResult<bool>;

    /// List managed containers
    async fn list(&self, opts: &ListOptions) -> BerthResult<Vec<ContainerSummary>>;

    /// Raw inspection data for one container
    ///
    /// Fails with [`BerthError::ContainerNotFound`] when it does not exist.
    async fn inspect(&self, id: &str) -> BerthResult<serde_json::Value>;

    /// Whether a container exists and is running; a missing container is not running
    async fn is_running(&self, id: &str) -> BerthResult<bool> {
        match self.inspect(id).await {
            Ok(data) => Ok(data
                .pointer("/State/Running")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)),
            Err(BerthError::ContainerNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Stop a container; a missing container is not an error
    async fn stop(&self, id: &str) -> BerthResult<()>;

    /// Remove a container; a missing container is not an error
    async fn remove(&self, id: &str, force: bool, volumes: bool) -> BerthResult<()>;

    /// Create an attachable network; an existing network is not an error
    async fn create_network(&self, name: &str) -> BerthResult<()>;

    /// Names of all networks
    async fn list_networks(&self) -> BerthResult<Vec<String>>;

    /// Remove a network; a missing network is not an error
    async fn remove_network(&self, name: &str) -> BerthResult<()>;

    /// Get the human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}

/// Compose-style project runner
#[async_trait]
pub trait ComposeRuntime: Send + Sync {
    /// Run one invocation, returning its output
    ///
    /// Non-zero exits are errors unless the invocation ignores return codes.
    async fn compose(&self, invocation: &ComposeInvocation) -> BerthResult<CommandOutput>;
}
