//! CLI command implementations

pub mod cache;
pub mod destroy;
pub mod exec;
pub mod info;
pub mod logs;
pub mod poweroff;
pub mod rebuild;
pub mod start;
pub mod stop;
pub mod task;

pub use cache::execute as cache;
pub use destroy::execute as destroy;
pub use exec::execute as exec;
pub use info::execute as info;
pub use logs::execute as logs;
pub use poweroff::execute as poweroff;
pub use rebuild::execute as rebuild;
pub use start::execute as start;
pub use stop::execute as stop;
pub use task::execute as task;

use crate::app::App;
use crate::bootstrap::{Bootstrap, BootstrapLevel};
use crate::config::Config;
use crate::error::{BerthError, BerthResult};
use crate::ui::{self, UiContext};

/// Bootstrap from the working directory up to `level`
///
/// A missing app file is reported before the engine is contacted.
async fn bootstrap(config: &Config, level: BootstrapLevel) -> BerthResult<Bootstrap> {
    let cwd = std::env::current_dir().map_err(|e| BerthError::io("getting current directory", e))?;
    let mut bootstrap = Bootstrap::new(config.clone(), cwd);
    if level == BootstrapLevel::App {
        bootstrap.advance_to(BootstrapLevel::Config).await?;
        if bootstrap.app_config().is_none() {
            return Err(BerthError::AppNotFound(bootstrap.cwd().to_path_buf()));
        }
    }
    bootstrap.advance_to(level).await?;
    Ok(bootstrap)
}

/// Print and drain the advisories handlers left on the app
fn report_messages(ctx: &UiContext, app: &mut App) {
    for message in app.messages.drain(..) {
        ui::step_warn(ctx, &message);
    }
}
