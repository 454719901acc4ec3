//! Cache command - inspect and clear the cache directory

use crate::bootstrap::BootstrapLevel;
use crate::cache::{AppCacheKeys, TASKS_CACHE_KEY};
use crate::cli::args::{CacheAction, CacheArgs};
use crate::config::Config;
use crate::error::BerthResult;
use crate::ui::{self, UiContext};

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> BerthResult<()> {
    let bootstrap = super::bootstrap(config, BootstrapLevel::Config).await?;
    let cache = bootstrap.cache()?;

    match args.action {
        CacheAction::Path => {
            println!("{}", cache.dir().display());
        }
        CacheAction::Clear { locks: true } => {
            let removed = cache.clear().await?;
            ui::step_ok(&UiContext::detect(), &format!("Cleared {} cache entries", removed));
        }
        CacheAction::Clear { locks: false } => {
            // Build locks stay while containers may still exist
            let mut keys = vec![TASKS_CACHE_KEY.to_string()];
            if let Some(app_config) = bootstrap.app_config() {
                let app_keys = AppCacheKeys::for_app(&app_config.name);
                keys.extend([app_keys.compose, app_keys.recipe, app_keys.meta]);
            }
            let mut removed = 0;
            for key in &keys {
                if cache.remove(key).await? {
                    removed += 1;
                }
            }
            ui::step_ok(&UiContext::detect(), &format!("Cleared {} cache entries", removed));
        }
    }
    Ok(())
}
