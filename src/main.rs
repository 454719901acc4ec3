//! Berth - local development environments on docker compose
//!
//! CLI entry point that dispatches to subcommands.

use berth::cli::args::LogFormat;
use berth::cli::{commands, Cli, Commands};
use berth::config::ConfigManager;
use berth::error::BerthResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            match e.exit_code() {
                Some(code) if (1..=255).contains(&code) => ExitCode::from(code as u8),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run() -> BerthResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // 0 = warn (spinners only), 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("berth=warn"),
        1 => EnvFilter::new("berth=info"),
        _ => EnvFilter::new("berth=debug"),
    };
    let json = match cli.log_format {
        Some(format) => format == LogFormat::Json,
        None => config.general.log_format == "json",
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }

    match cli.command {
        Commands::Start => commands::start(&config).await,
        Commands::Stop(args) => commands::stop(args, &config).await,
        Commands::Rebuild => commands::rebuild(&config).await,
        Commands::Destroy(args) => commands::destroy(args, &config).await,
        Commands::Info(args) => commands::info(args, &config).await,
        Commands::Logs(args) => commands::logs(args, &config).await,
        Commands::Exec(args) => commands::exec(args, &config).await,
        Commands::Task(args) => commands::task(args, &config).await,
        Commands::Poweroff => commands::poweroff(&config).await,
        Commands::Cache(args) => commands::cache(args, &config).await,
    }
}
