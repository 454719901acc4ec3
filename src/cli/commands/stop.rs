//! Stop command - stop the app's containers

use crate::bootstrap::BootstrapLevel;
use crate::cli::args::StopArgs;
use crate::config::Config;
use crate::error::BerthResult;
use crate::ui::{TaskSpinner, UiContext};

/// Execute the stop command
pub async fn execute(args: StopArgs, config: &Config) -> BerthResult<()> {
    let ctx = UiContext::detect();
    let mut bootstrap = super::bootstrap(config, BootstrapLevel::App).await?;
    let (app, lifecycle) = bootstrap.app()?;

    let verb = if args.kill { "Killing" } else { "Stopping" };
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("{} {}...", verb, app.name));
    if let Err(e) = app.stop(lifecycle, args.kill).await {
        spinner.stop_error(&format!("Could not stop {}", app.name));
        return Err(e);
    }
    spinner.stop(&format!("Stopped {}", app.name));

    super::report_messages(&ctx, app);
    Ok(())
}
