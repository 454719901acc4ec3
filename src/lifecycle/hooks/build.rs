//! Image builds, build steps and their locks

use crate::app::{App, ServiceDescriptor};
use crate::cache::{locks, LockGeneration, UNKNOWN_BUILT_AGAINST};
use crate::error::BerthResult;
use crate::lifecycle::HookContext;
use crate::orchestration::{Directive, ListOptions};
use tracing::{debug, info};

const REBUILD_TIP: &str = "This app was built against a different version of berth; run `berth rebuild` to pick up changes";

/// Drop a generation's locks once the project has no containers left
pub(super) async fn purge_build_locks(
    app: &mut App,
    ctx: &HookContext,
    generation: LockGeneration,
) -> BerthResult<()> {
    let keys = app.cache_keys.locks(generation);
    locks::purge_if_idle(&ctx.cache, ctx.engine(), &app.project, &keys).await?;
    Ok(())
}

/// `(service, step)` for every step, in service order
fn collect_steps(app: &App, select: impl Fn(&ServiceDescriptor) -> &[String]) -> Vec<(String, String)> {
    app.services()
        .iter()
        .flat_map(|s| select(s).iter().map(|step| (s.name.clone(), step.clone())))
        .collect()
}

fn step_fingerprint(steps: &[(String, String)], version: &str) -> String {
    let flat: Vec<String> = steps
        .iter()
        .map(|(service, step)| format!("{}: {}", service, step))
        .collect();
    locks::fingerprint(&flat, version)
}

/// Pull and build images unless an identical build already ran
pub(super) async fn build_images(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    let inputs: Vec<String> = app
        .services()
        .iter()
        .map(|s| match (s.fragment.get("build"), s.fragment.get("image")) {
            (Some(context), _) => format!("build {}={}", s.name, context),
            (None, Some(image)) => format!("pull {}={}", s.name, image),
            (None, None) => format!("service {}", s.name),
        })
        .collect();
    let fingerprint = locks::fingerprint(&inputs, &ctx.version);
    let lock = app.cache_keys.v4_pre_lock.clone();

    if locks::is_current(&ctx.cache, &lock, &fingerprint).await {
        debug!("Images for {} are current ({})", app.name, fingerprint);
        return Ok(());
    }

    info!("Building images for {}", app.name);
    ctx.router.build(&[app.directive()]).await.into_result()?;
    locks::record(&ctx.cache, &lock, &fingerprint).await?;
    app.meta
        .record_built_against(&ctx.cache, &app.cache_keys, &ctx.version)
        .await?;
    Ok(())
}

/// Run service build steps as one chain, starting and stopping containers once
pub(super) async fn run_build_steps(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    let steps = collect_steps(app, |s| s.build_steps.as_slice());
    if steps.is_empty() {
        return Ok(());
    }
    let fingerprint = step_fingerprint(&steps, &ctx.version);
    let lock = app.cache_keys.pre_lock.clone();
    if locks::is_current(&ctx.cache, &lock, &fingerprint).await {
        debug!("Build steps for {} already ran ({})", app.name, fingerprint);
        return Ok(());
    }

    let count = steps.len();
    let directives: Vec<Directive> = steps
        .into_iter()
        .enumerate()
        .map(|(i, (service, step))| {
            let mut directive = app.service_directive(&service).with_cmd(step.as_str());
            directive.opts.prestart = true;
            directive.opts.last = i + 1 == count;
            directive
        })
        .collect();

    info!("Running {} build step(s) for {}", count, app.name);
    ctx.router.run(&directives).await?;
    locks::record(&ctx.cache, &lock, &fingerprint).await
}

/// Run service run steps once the app is up
pub(super) async fn run_post_start_steps(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    let steps = collect_steps(app, |s| s.run_steps.as_slice());
    if steps.is_empty() {
        return Ok(());
    }
    let fingerprint = step_fingerprint(&steps, &ctx.version);
    let lock = app.cache_keys.post_lock.clone();
    if locks::is_current(&ctx.cache, &lock, &fingerprint).await {
        debug!("Run steps for {} already ran ({})", app.name, fingerprint);
        return Ok(());
    }

    let directives: Vec<Directive> = steps
        .into_iter()
        .map(|(service, step)| app.service_directive(&service).with_cmd(step.as_str()))
        .collect();

    info!("Running {} post-start step(s) for {}", directives.len(), app.name);
    ctx.router.run(&directives).await?;
    locks::record(&ctx.cache, &lock, &fingerprint).await
}

/// A rebuild brings the app up to the running version
pub(super) async fn update_built_against(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    app.meta
        .record_built_against(&ctx.cache, &app.cache_keys, &ctx.version)
        .await
}

/// Containers with no recorded version were built by something unknown
pub(super) async fn update_built_against_pre(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    if app.meta.built_against.is_some() {
        return Ok(());
    }
    let containers = ctx
        .engine()
        .list(&ListOptions {
            all: true,
            project: Some(app.project.clone()),
        })
        .await?;
    if !containers.is_empty() {
        app.meta
            .record_built_against(&ctx.cache, &app.cache_keys, UNKNOWN_BUILT_AGAINST)
            .await?;
    }
    Ok(())
}

/// First start records the version; a mismatch suggests a rebuild
pub(super) async fn update_built_against_post(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    if app.meta.built_against.is_none() {
        app.meta
            .record_built_against(&ctx.cache, &app.cache_keys, &ctx.version)
            .await?;
    }
    if app.meta.needs_rebuild(&ctx.version) {
        app.messages.push(REBUILD_TIP.to_string());
    }
    Ok(())
}
