//! Orchestration module for container runtimes
//!
//! - `runtime`: engine and compose traits
//! - `engine` / `compose`: CLI-backed implementations
//! - `router`: directive routing and the run protocol

pub mod compose;
pub mod directive;
pub mod engine;
mod factory;
#[cfg(test)]
pub mod fake;
pub mod router;
mod runtime;

pub use compose::{ComposeAction, ComposeCli, ComposeFlags, ComposeInvocation, OutputMode};
pub use directive::{CommandSpec, Directive, DirectiveOptions};
pub use engine::DockerEngine;
pub use factory::{create_runtimes, detect_compose, Platform, Runtimes};
pub use router::{default_cli_env, BatchOutcome, Router};
pub use runtime::{CommandOutput, ComposeRuntime, ContainerRuntime, ContainerSummary, ListOptions};

use tokio::io::{AsyncBufReadExt, BufReader};

/// Container labels
pub mod labels {
    pub const INSTANCE: &str = "io.berth.instance";
    pub const PROJECT: &str = "io.berth.project";
    pub const ROOT: &str = "io.berth.root";
    pub const SRC: &str = "io.berth.src";
    pub const COMPOSE_PROJECT: &str = "com.docker.compose.project";
    pub const COMPOSE_SERVICE: &str = "com.docker.compose.service";
}

/// Max number of output lines to include in error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of command output for error diagnostics.
pub(crate) fn build_error_output(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let total = lines.len();
    let tail: Vec<&str> = if total > ERROR_TAIL_LINES {
        lines[total - ERROR_TAIL_LINES..].to_vec()
    } else {
        lines
    };
    tail.join("\n")
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns all collected output lines. Pipes that were not captured are
/// treated as already closed.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> Vec<String> {
    let mut stderr_reader = child.stderr.take().map(|s| BufReader::new(s).lines());
    let mut stdout_reader = child.stdout.take().map(|s| BufReader::new(s).lines());

    let mut all_output = Vec::new();
    let mut stderr_done = stderr_reader.is_none();
    let mut stdout_done = stdout_reader.is_none();

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = async { stderr_reader.as_mut()?.next_line().await.ok().flatten() }, if !stderr_done => {
                match line {
                    Some(line) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    None => stderr_done = true,
                }
            }
            line = async { stdout_reader.as_mut()?.next_line().await.ok().flatten() }, if !stdout_done => {
                match line {
                    Some(line) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    None => stdout_done = true,
                }
            }
        }
    }

    all_output
}
