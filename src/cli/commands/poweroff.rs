//! Poweroff command - stop everything this install runs

use crate::bootstrap::BootstrapLevel;
use crate::config::Config;
use crate::error::BerthResult;
use crate::orchestration::ListOptions;
use crate::ui::{self, TaskSpinner, UiContext};
use tracing::warn;

/// Execute the poweroff command
pub async fn execute(config: &Config) -> BerthResult<()> {
    let ctx = UiContext::detect();
    let bootstrap = super::bootstrap(config, BootstrapLevel::Engine).await?;
    let engine = bootstrap.runtimes()?.engine.clone();

    let running = engine.list(&ListOptions::default()).await?;
    if running.is_empty() {
        ui::step_info(&ctx, "No berth containers are running");
        return Ok(());
    }

    // A failed stop does not abort the rest
    for container in &running {
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start(&format!("Stopping {}", container.name));
        match engine.stop(&container.id).await {
            Ok(()) => spinner.stop(&format!("Stopped {}", container.name)),
            Err(e) => {
                warn!("Could not stop {}: {}", container.name, e);
                spinner.stop_error(&format!("Could not stop {}", container.name));
            }
        }
    }

    let network = &config.engine.bridge_network;
    if engine.list_networks().await?.iter().any(|n| n == network) {
        engine.remove_network(network).await?;
        ui::step_ok(&ctx, &format!("Removed network {}", network));
    }
    Ok(())
}
