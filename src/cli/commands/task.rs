//! Task command - run or list app tooling

use crate::bootstrap::{BootstrapLevel, TaskEntry};
use crate::cli::args::TaskArgs;
use crate::config::Config;
use crate::error::{BerthError, BerthResult};
use crate::orchestration::CommandSpec;
use console::style;
use tracing::debug;

/// Execute the task command
pub async fn execute(args: TaskArgs, config: &Config) -> BerthResult<()> {
    let Some(name) = args.name else {
        let bootstrap = super::bootstrap(config, BootstrapLevel::Tasks).await?;
        print_tasks(bootstrap.tasks());
        return Ok(());
    };

    let mut bootstrap = super::bootstrap(config, BootstrapLevel::App).await?;
    let (app, lifecycle) = bootstrap.app()?;
    let tooling = app
        .config
        .tooling
        .get(&name)
        .cloned()
        .ok_or_else(|| BerthError::UnknownTask(name.clone()))?;

    let mut argv = CommandSpec::from(tooling.cmd.as_str()).to_argv()?;
    argv.extend(args.args);
    debug!("Running task {} in {}: {:?}", name, tooling.service, argv);

    let mut directive = app.service_directive(&tooling.service).with_cmd(argv);
    directive.opts.interactive = true;
    directive.opts.user = tooling.user;

    lifecycle.ctx().router.run(&[directive]).await?;
    Ok(())
}

fn print_tasks(tasks: &[TaskEntry]) {
    let width = tasks.iter().map(|t| t.name.len()).max().unwrap_or(0);
    for task in tasks {
        let name = format!("{:<width$}", task.name, width = width);
        match &task.service {
            Some(service) => println!(
                "  {}  {} {}",
                style(name).cyan(),
                task.description,
                style(format!("[{}]", service)).dim()
            ),
            None => println!("  {}  {}", style(name).cyan(), task.description),
        }
    }
}
