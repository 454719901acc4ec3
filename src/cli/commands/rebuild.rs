//! Rebuild command - recreate containers from fresh images

use crate::bootstrap::BootstrapLevel;
use crate::config::Config;
use crate::error::BerthResult;
use crate::ui::{TaskSpinner, UiContext};

/// Execute the rebuild command
pub async fn execute(config: &Config) -> BerthResult<()> {
    let ctx = UiContext::detect();
    let mut bootstrap = super::bootstrap(config, BootstrapLevel::App).await?;
    let (app, lifecycle) = bootstrap.app()?;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Rebuilding {}...", app.name));
    if let Err(e) = app.rebuild(lifecycle).await {
        spinner.stop_error(&format!("Could not rebuild {}", app.name));
        return Err(e);
    }
    spinner.stop(&format!("Rebuilt {}", app.name));

    super::report_messages(&ctx, app);
    Ok(())
}
