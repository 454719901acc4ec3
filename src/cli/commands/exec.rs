//! Exec command - run a command in a service container

use crate::bootstrap::BootstrapLevel;
use crate::cli::args::ExecArgs;
use crate::config::Config;
use crate::error::{BerthError, BerthResult};

/// Execute the exec command
pub async fn execute(args: ExecArgs, config: &Config) -> BerthResult<()> {
    let mut bootstrap = super::bootstrap(config, BootstrapLevel::App).await?;
    let (app, lifecycle) = bootstrap.app()?;

    if app.service(&args.service).is_none() {
        return Err(BerthError::User(format!("{} has no service {}", app.name, args.service)));
    }

    let mut directive = app.service_directive(&args.service).with_cmd(args.command);
    directive.opts.interactive = true;
    directive.opts.user = args.user;
    directive.opts.environment = args.env.into_iter().collect();

    lifecycle.ctx().router.run(&[directive]).await?;
    Ok(())
}
