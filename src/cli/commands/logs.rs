//! Logs command - service output

use crate::bootstrap::BootstrapLevel;
use crate::cli::args::LogsArgs;
use crate::config::Config;
use crate::error::{BerthError, BerthResult};

/// Execute the logs command
pub async fn execute(args: LogsArgs, config: &Config) -> BerthResult<()> {
    let mut bootstrap = super::bootstrap(config, BootstrapLevel::App).await?;
    let (app, lifecycle) = bootstrap.app()?;

    if let Some(unknown) = args.services.iter().find(|s| app.service(s).is_none()) {
        return Err(BerthError::User(format!("{} has no service {}", app.name, unknown)));
    }

    let mut directive = app.directive().with_services(args.services);
    directive.opts.follow = args.follow;
    directive.opts.timestamps = args.timestamps;

    lifecycle.ctx().router.logs(&[directive]).await.into_result()?;
    Ok(())
}
