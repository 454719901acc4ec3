//! Start command - bring the app up

use crate::bootstrap::BootstrapLevel;
use crate::config::Config;
use crate::error::BerthResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the start command
pub async fn execute(config: &Config) -> BerthResult<()> {
    let ctx = UiContext::detect();
    let mut bootstrap = super::bootstrap(config, BootstrapLevel::App).await?;
    let (app, lifecycle) = bootstrap.app()?;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Starting {}...", app.name));
    if let Err(e) = app.start(lifecycle).await {
        spinner.stop_error(&format!("Could not start {}", app.name));
        return Err(e);
    }
    spinner.stop(&format!("Started {}", app.name));

    for info in &app.info {
        for hostname in &info.hostnames {
            ui::key_value(&ctx, &info.service, hostname);
        }
    }
    super::report_messages(&ctx, app);
    Ok(())
}
