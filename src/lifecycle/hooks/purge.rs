//! Teardown of persisted app state

use crate::app::{units, App};
use crate::cache::AppMeta;
use crate::error::{BerthError, BerthResult};
use crate::lifecycle::HookContext;
use tracing::debug;

/// Drop dangling compose files and the compose cache
pub(super) async fn purge_compose_cache(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    let removed = units::remove_danglers(app.compose_dir(), &app.compose_units).await?;
    if removed > 0 {
        debug!("Removed {} dangling compose file(s)", removed);
    }
    ctx.cache.remove(&app.cache_keys.compose).await?;
    Ok(())
}

pub(super) async fn purge_recipe_cache(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    ctx.cache.remove(&app.cache_keys.recipe).await?;
    Ok(())
}

pub(super) async fn purge_metadata_cache(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    ctx.cache.remove(&app.cache_keys.meta).await?;
    app.meta = AppMeta::default();
    Ok(())
}

pub(super) async fn purge_compose_dir(app: &mut App, _ctx: &HookContext) -> BerthResult<()> {
    let dir = app.compose_dir();
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!("Removed {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(BerthError::io(format!("removing {}", dir.display()), e)),
    }
    app.compose_units.clear();
    Ok(())
}
