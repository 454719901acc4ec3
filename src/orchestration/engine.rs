//! Docker-compatible engine client
//!
//! Drives the engine CLI directly. Listings use `--format '{{json .}}'` so
//! each container arrives as one JSON object per line.

use crate::error::{BerthError, BerthResult};
use crate::orchestration::labels;
use crate::orchestration::runtime::{ContainerRuntime, ContainerSummary, ListOptions};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const REMOVAL_IN_PROGRESS: &str = "Removal In Progress";
const JUST_STARTED: &str = "Up Less than a second";
const LIST_RETRIES: u32 = 10;
const LIST_RETRY_DELAY: Duration = Duration::from_millis(200);

/// One line of `ps --format '{{json .}}'`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    names: String,
    #[serde(default)]
    labels: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    state: Option<String>,
}

/// Parse `k=v,k=v` label strings
fn parse_labels(raw: &str) -> HashMap<&str, &str> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .collect()
}

fn parse_ps_line(line: &str) -> BerthResult<ContainerSummary> {
    let ps: PsLine = serde_json::from_str(line)?;
    let labels = parse_labels(&ps.labels);
    let running = match ps.state.as_deref() {
        Some(state) => state == "running",
        None => !ps.status.contains("Exited"),
    };

    Ok(ContainerSummary {
        project: labels.get(labels::COMPOSE_PROJECT).map(|s| s.to_string()),
        service: labels.get(labels::COMPOSE_SERVICE).map(|s| s.to_string()),
        id: ps.id,
        name: ps.names,
        status: ps.status,
        running,
    })
}

fn is_missing(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such container") || lower.contains("no such object")
}

/// Engine client for the `docker` CLI (or a compatible binary)
#[derive(Debug, Clone)]
pub struct DockerEngine {
    bin: String,
    instance: String,
}

impl DockerEngine {
    /// Client for `bin`, scoped to containers labelled with `instance`
    pub fn new(bin: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            instance: instance.into(),
        }
    }

    /// Execute an engine command and return the output
    async fn exec(&self, args: &[&str]) -> BerthResult<std::process::Output> {
        debug!("Executing: {} {:?}", self.bin, args);

        Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BerthError::command_failed(format!("{} {}", self.bin, args.join(" ")), e))
    }

    fn failure(&self, args: &[&str], output: &std::process::Output) -> BerthError {
        BerthError::runtime_command(
            format!("{} {}", self.bin, args.join(" ")),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
            output.status.code().unwrap_or(-1),
        )
    }

    async fn list_once(&self, opts: &ListOptions) -> BerthResult<Vec<ContainerSummary>> {
        let filter = format!("label={}={}", labels::INSTANCE, self.instance);
        let mut args = vec!["ps", "--no-trunc", "--format", "{{json .}}", "--filter", filter.as_str()];
        if opts.all {
            args.push("--all");
        }

        let output = self.exec(&args).await?;
        if !output.status.success() {
            return Err(self.failure(&args, &output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut containers = Vec::new();
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            match parse_ps_line(line) {
                Ok(container) => containers.push(container),
                Err(e) => warn!("Skipping unparseable container listing: {}", e),
            }
        }

        Ok(containers
            .into_iter()
            .filter(|c| c.status != REMOVAL_IN_PROGRESS)
            .filter(|c| match &opts.project {
                Some(project) => c.project.as_deref() == Some(project.as_str()),
                None => true,
            })
            .collect())
    }
}

#[async_trait]
impl ContainerRuntime for DockerEngine {
    async fn is_available(&self) -> BerthResult<bool> {
        match self.exec(&["version", "--format", "{{.Server.Version}}"]).await {
            Ok(output) => Ok(output.status.success()),
            Err(BerthError::CommandFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list(&self, opts: &ListOptions) -> BerthResult<Vec<ContainerSummary>> {
        let mut attempt = 0;
        loop {
            let containers = self.list_once(opts).await?;
            attempt += 1;
            // Containers that just came up may still flip to exited
            if attempt < LIST_RETRIES && containers.iter().any(|c| c.status == JUST_STARTED) {
                tokio::time::sleep(LIST_RETRY_DELAY).await;
                continue;
            }
            return Ok(containers);
        }
    }

    async fn inspect(&self, id: &str) -> BerthResult<serde_json::Value> {
        let args = ["inspect", "--type", "container", id];
        let output = self.exec(&args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_missing(&stderr) {
                return Err(BerthError::ContainerNotFound(id.to_string()));
            }
            return Err(self.failure(&args, &output));
        }

        let data: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        match data {
            serde_json::Value::Array(mut items) if !items.is_empty() => Ok(items.swap_remove(0)),
            serde_json::Value::Array(_) => Err(BerthError::ContainerNotFound(id.to_string())),
            other => Ok(other),
        }
    }

    async fn stop(&self, id: &str) -> BerthResult<()> {
        let args = ["stop", id];
        let output = self.exec(&args).await?;
        if output.status.success() || is_missing(&String::from_utf8_lossy(&output.stderr)) {
            return Ok(());
        }
        Err(self.failure(&args, &output))
    }

    async fn remove(&self, id: &str, force: bool, volumes: bool) -> BerthResult<()> {
        let mut args = vec!["rm"];
        if force {
            args.push("--force");
        }
        if volumes {
            args.push("--volumes");
        }
        args.push(id);

        let output = self.exec(&args).await?;
        if output.status.success() || is_missing(&String::from_utf8_lossy(&output.stderr)) {
            return Ok(());
        }
        Err(self.failure(&args, &output))
    }

    async fn create_network(&self, name: &str) -> BerthResult<()> {
        let args = ["network", "create", "--attachable", name];
        let output = self.exec(&args).await?;
        if output.status.success()
            || String::from_utf8_lossy(&output.stderr).contains("already exists")
        {
            return Ok(());
        }
        Err(self.failure(&args, &output))
    }

    async fn list_networks(&self) -> BerthResult<Vec<String>> {
        let args = ["network", "ls", "--format", "{{.Name}}"];
        let output = self.exec(&args).await?;
        if !output.status.success() {
            return Err(self.failure(&args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn remove_network(&self, name: &str) -> BerthResult<()> {
        let args = ["network", "rm", name];
        let output = self.exec(&args).await?;
        let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
        if output.status.success() || stderr.contains("no such network") || stderr.contains("not found")
        {
            return Ok(());
        }
        Err(self.failure(&args, &output))
    }

    fn runtime_name(&self) -> &'static str {
        "Docker"
    }
}
