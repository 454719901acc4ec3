//! Discovery and readiness handlers

use crate::app::App;
use crate::cache::SetOptions;
use crate::error::BerthResult;
use crate::lifecycle::HookContext;
use tracing::{debug, info};

/// Mark the recipe's derived config as computed
pub(super) async fn add_recipe(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    if let Some(recipe) = &app.recipe {
        ctx.cache
            .set(&app.cache_keys.recipe, recipe, SetOptions::persistent())
            .await?;
        debug!("Applied recipe {} to {}", recipe, app.name);
    }
    Ok(())
}

/// Turn every declared service into a descriptor
pub(super) async fn add_services(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    let declared = app.config.services.clone();
    for (name, service) in &declared {
        let descriptor = ctx.builders.build(name, service, &app.root)?;
        app.add_service(descriptor)?;
    }
    Ok(())
}

pub(super) async fn add_hostnames(app: &mut App, _ctx: &HookContext) -> BerthResult<()> {
    let hostnames: Vec<String> = app
        .info
        .iter()
        .map(|i| app.hostname_for(&i.service))
        .collect();
    for (info, hostname) in app.info.iter_mut().zip(hostnames) {
        info.hostnames = vec![hostname];
    }
    Ok(())
}

pub(super) async fn set_info_env(app: &mut App, _ctx: &HookContext) -> BerthResult<()> {
    let info = app.info_env()?;
    app.set_env("BERTH_INFO", info);
    Ok(())
}

/// Persist the derived model so the next init can skip discovery
pub(super) async fn set_compose_cache(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    ctx.cache
        .set(&app.cache_keys.compose, &app.snapshot(), SetOptions::persistent())
        .await?;
    debug!("Saved compose cache {}", app.cache_keys.compose);
    Ok(())
}

/// Create the shared bridge network if the engine does not have it
pub(super) async fn ensure_network(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    let network = app.bridge_network();
    let networks = ctx.engine().list_networks().await?;
    if !networks.iter().any(|n| n == network) {
        info!("Creating network {}", network);
        ctx.engine().create_network(network).await?;
    }
    Ok(())
}

/// Re-derive which services are pulled and which are built
pub(super) async fn set_pullables(app: &mut App, _ctx: &HookContext) -> BerthResult<()> {
    app.refresh_plan();
    debug!(
        "Pullable services {:?}, local services {:?}",
        app.plan.pullable, app.plan.local
    );
    Ok(())
}
