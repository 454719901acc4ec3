//! Compose invocation building and execution
//!
//! Every compose call has the shape
//! `<compose> --project-name P --file F1 --file F2 <action> <flags> <services> <cmd>`.

use crate::error::{BerthError, BerthResult};
use crate::orchestration::runtime::{CommandOutput, ComposeRuntime};
use crate::orchestration::stream_child_output;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Compose subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComposeAction {
    Build,
    Down,
    Exec,
    Kill,
    Logs,
    Ps,
    Pull,
    Rm,
    Stop,
    Up,
}

impl ComposeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Down => "down",
            Self::Exec => "exec",
            Self::Kill => "kill",
            Self::Logs => "logs",
            Self::Ps => "ps",
            Self::Pull => "pull",
            Self::Rm => "rm",
            Self::Stop => "stop",
            Self::Up => "up",
        }
    }
}

/// Compose flags, rendered in a fixed order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeFlags {
    pub detach: bool,
    pub follow: bool,
    pub force: bool,
    pub no_cache: bool,
    pub no_recreate: bool,
    pub no_deps: bool,
    pub no_tty: bool,
    pub pull: bool,
    pub quiet: bool,
    pub force_recreate: bool,
    pub remove_orphans: bool,
    pub rm: bool,
    pub timestamps: bool,
    pub volumes: bool,
    pub environment: BTreeMap<String, String>,
    pub user: Option<String>,
    pub workdir: Option<String>,
}

impl ComposeFlags {
    /// Default flags for an action
    pub fn defaults(action: ComposeAction) -> Self {
        let mut flags = Self::default();
        match action {
            ComposeAction::Build => flags.pull = true,
            ComposeAction::Down => {
                flags.remove_orphans = true;
                flags.volumes = true;
            }
            ComposeAction::Ps => flags.quiet = true,
            ComposeAction::Rm => {
                flags.force = true;
                flags.volumes = true;
            }
            ComposeAction::Up => {
                flags.detach = true;
                flags.no_recreate = true;
                flags.remove_orphans = true;
            }
            ComposeAction::Exec
            | ComposeAction::Kill
            | ComposeAction::Logs
            | ComposeAction::Pull
            | ComposeAction::Stop => {}
        }
        flags
    }

    /// Render as argv
    pub fn to_args(&self) -> Vec<String> {
        let switches = [
            (self.detach, "--detach"),
            (self.follow, "--follow"),
            (self.force, "--force"),
            (self.no_cache, "--no-cache"),
            (self.no_recreate, "--no-recreate"),
            (self.no_deps, "--no-deps"),
            (self.no_tty, "-T"),
            (self.pull, "--pull"),
            (self.quiet, "--quiet"),
            (self.force_recreate, "--force-recreate"),
            (self.remove_orphans, "--remove-orphans"),
            (self.rm, "--rm"),
            (self.timestamps, "--timestamps"),
            (self.volumes, "-v"),
        ];

        let mut args: Vec<String> = switches
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, flag)| flag.to_string())
            .collect();

        for (key, value) in &self.environment {
            args.push("--env".to_string());
            args.push(format!("{}={}", key, value));
        }
        if let Some(user) = &self.user {
            args.push("--user".to_string());
            args.push(user.clone());
        }
        if let Some(workdir) = &self.workdir {
            args.push("--workdir".to_string());
            args.push(workdir.clone());
        }
        args
    }
}

/// How a compose process's output is handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Capture stdout and stderr
    #[default]
    Capture,
    /// Forward lines to the terminal as they arrive, and capture them
    Stream,
    /// Hand the terminal to the process (interactive exec)
    Inherit,
}

/// One fully specified compose call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeInvocation {
    pub action: ComposeAction,
    pub project: String,
    pub files: Vec<PathBuf>,
    pub services: Vec<String>,
    pub cmd: Vec<String>,
    pub flags: ComposeFlags,
    pub ignore_return_code: bool,
    pub mode: OutputMode,
}

impl ComposeInvocation {
    /// An invocation with the action's default flags
    pub fn new(action: ComposeAction, project: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            action,
            project: project.into(),
            files,
            services: Vec::new(),
            cmd: Vec::new(),
            flags: ComposeFlags::defaults(action),
            ignore_return_code: false,
            mode: OutputMode::Capture,
        }
    }

    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.services = services;
        self
    }

    /// Compose argv, without the compose binary itself
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["--project-name".to_string(), self.project.clone()];
        for file in &self.files {
            args.push("--file".to_string());
            args.push(file.display().to_string());
        }
        args.push(self.action.as_str().to_string());
        args.extend(self.flags.to_args());
        args.extend(self.services.iter().cloned());
        args.extend(self.cmd.iter().cloned());
        args
    }
}

/// Detect a backgrounded command and rewrite it for a detached exec
///
/// A trailing `&` argument, or `sh -c "... &"` / `bash -c "... &"`, means the
/// caller wants the process to outlive the exec. Returns whether `cmd` was
/// rewritten.
pub fn detect_detached_exec(cmd: &mut Vec<String>) -> bool {
    let is_shell = cmd
        .first()
        .is_some_and(|c| c.ends_with("sh") || c.ends_with("bash"));

    if is_shell && cmd.len() >= 3 && cmd[1] == "-c" && cmd[2].trim_end().ends_with('&') {
        let script = cmd[2].trim_end();
        cmd[2] = script[..script.len() - 1].trim().to_string();
        return true;
    }

    if cmd.last().is_some_and(|c| c == "&") {
        cmd.pop();
        return true;
    }

    false
}

/// Compose runtime backed by a compose CLI (`docker compose` or `docker-compose`)
#[derive(Debug, Clone)]
pub struct ComposeCli {
    program: PathBuf,
    base_args: Vec<String>,
}

impl ComposeCli {
    /// `program` with `base_args` prepended to every invocation
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }

    /// Command line as shown in diagnostics
    pub fn display(&self, invocation: &ComposeInvocation) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.base_args.iter().cloned());
        parts.extend(invocation.args());
        parts.join(" ")
    }

    fn command(&self, invocation: &ComposeInvocation) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args).args(invocation.args());
        cmd
    }
}

#[async_trait]
impl ComposeRuntime for ComposeCli {
    async fn compose(&self, invocation: &ComposeInvocation) -> BerthResult<CommandOutput> {
        let command_line = self.display(invocation);
        debug!("Executing: {}", command_line);

        let output = match invocation.mode {
            OutputMode::Capture => {
                let output = self
                    .command(invocation)
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .output()
                    .await
                    .map_err(|e| BerthError::command_failed(&command_line, e))?;

                CommandOutput {
                    command: command_line,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                    code: output.status.code().unwrap_or(-1),
                }
            }
            OutputMode::Stream => {
                let mut child = self
                    .command(invocation)
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .spawn()
                    .map_err(|e| BerthError::command_failed(&command_line, e))?;

                let lines = stream_child_output(&mut child, &|line| println!("{}", line)).await;
                let status = child
                    .wait()
                    .await
                    .map_err(|e| BerthError::command_failed(&command_line, e))?;

                CommandOutput {
                    command: command_line,
                    stdout: lines.join("\n"),
                    stderr: String::new(),
                    code: status.code().unwrap_or(-1),
                }
            }
            OutputMode::Inherit => {
                let status = self
                    .command(invocation)
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await
                    .map_err(|e| BerthError::command_failed(&command_line, e))?;

                CommandOutput {
                    command: command_line,
                    code: status.code().unwrap_or(-1),
                    ..Default::default()
                }
            }
        };

        output.into_result(invocation.ignore_return_code)
    }
}
