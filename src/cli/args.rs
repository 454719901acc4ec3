//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Berth - local development environments on docker compose
///
/// Finds the app file above the working directory and drives its
/// containers through start, stop, rebuild and destroy.
#[derive(Parser, Debug)]
#[command(name = "berth")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BERTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format (overrides general.log_format)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the app
    Start,

    /// Stop the app
    Stop(StopArgs),

    /// Rebuild images and restart the app
    Rebuild,

    /// Remove the app's containers, networks, volumes and cached state
    Destroy(DestroyArgs),

    /// Show services, hostnames and health
    Info(InfoArgs),

    /// Show service logs
    Logs(LogsArgs),

    /// Run a command in a service container
    Exec(ExecArgs),

    /// Run an app task, or list tasks
    Task(TaskArgs),

    /// Stop every container berth manages
    Poweroff,

    /// Manage the cache directory
    Cache(CacheArgs),
}

/// Arguments for the stop command
#[derive(Parser, Debug)]
pub struct StopArgs {
    /// Kill containers instead of stopping them gracefully
    #[arg(short, long)]
    pub kill: bool,
}

/// Arguments for the destroy command
#[derive(Parser, Debug)]
pub struct DestroyArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the info command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Only these services
    #[arg(short, long)]
    pub service: Vec<String>,

    /// Print raw container inspection data as JSON
    #[arg(long)]
    pub deep: bool,
}

/// Arguments for the logs command
#[derive(Parser, Debug)]
pub struct LogsArgs {
    /// Follow log output
    #[arg(short, long)]
    pub follow: bool,

    /// Show timestamps
    #[arg(short, long)]
    pub timestamps: bool,

    /// Services to show (defaults to all)
    pub services: Vec<String>,
}

/// Arguments for the exec command
#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Service to run in
    pub service: String,

    /// User to run as
    #[arg(short, long)]
    pub user: Option<String>,

    /// Additional environment variables (KEY=VALUE)
    #[arg(short, long, value_parser = parse_env_var)]
    pub env: Vec<(String, String)>,

    /// Command and arguments to run
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Arguments for the task command
#[derive(Parser, Debug)]
pub struct TaskArgs {
    /// Task to run (lists tasks when omitted)
    pub name: Option<String>,

    /// Arguments appended to the task's command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show the cache directory
    Path,

    /// Delete cached entries
    Clear {
        /// Also delete build locks while containers still exist
        #[arg(long)]
        locks: bool,
    },
}

/// Output format for the info command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Parse environment variable in KEY=VALUE format
fn parse_env_var(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE format: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
