//! Observed container state

use crate::app::{App, Health};
use crate::error::BerthResult;
use crate::lifecycle::HookContext;
use crate::orchestration::ListOptions;
use tracing::debug;

/// Map services to the containers the engine reports for the project
pub(super) async fn find_containers(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    let containers = ctx
        .engine()
        .list(&ListOptions {
            all: true,
            project: Some(app.project.clone()),
        })
        .await?;

    app.containers = containers
        .into_iter()
        .filter_map(|c| c.service.map(|service| (service, c.id)))
        .collect();
    debug!("Found {} container(s) for {}", app.containers.len(), app.project);
    Ok(())
}

fn health_of(inspect: Option<&serde_json::Value>) -> Health {
    let Some(data) = inspect else {
        return Health::Unhealthy;
    };
    if let Some(status) = data.pointer("/State/Health/Status").and_then(|s| s.as_str()) {
        return if status == "healthy" {
            Health::Healthy
        } else {
            Health::Unhealthy
        };
    }
    match data.pointer("/State/Running").and_then(|r| r.as_bool()) {
        Some(true) => Health::Healthy,
        _ => Health::Unhealthy,
    }
}

/// Record each service's health from its container
pub(super) async fn health_checks(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    for service in app.service_names() {
        let data = ctx.router.scan(&app.service_directive(&service)).await?;
        let health = health_of(data.as_ref());
        if health == Health::Unhealthy {
            app.messages
                .push(format!("Service {} is not healthy", service));
        }
        if let Some(info) = app.info.iter_mut().find(|i| i.service == service) {
            info.healthy = health;
        }
    }
    Ok(())
}

/// URLs published to the host by a container's port bindings
fn localhost_urls(inspect: &serde_json::Value) -> Vec<String> {
    let Some(ports) = inspect
        .pointer("/NetworkSettings/Ports")
        .and_then(|p| p.as_object())
    else {
        return Vec::new();
    };

    let mut urls = Vec::new();
    for (port, bindings) in ports {
        let scheme = if port.starts_with("443/") { "https" } else { "http" };
        let host_ports = bindings
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|b| b.get("HostPort").and_then(|p| p.as_str()))
            .filter(|p| !p.is_empty());
        for host_port in host_ports {
            let url = format!("{}://localhost:{}", scheme, host_port);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

/// Record the localhost URLs of every service with a container
pub(super) async fn find_localhosts(app: &mut App, ctx: &HookContext) -> BerthResult<()> {
    for info in &mut app.info {
        let Some(id) = app.containers.get(&info.service) else {
            continue;
        };
        match ctx.engine().inspect(id).await {
            Ok(data) => info.urls = localhost_urls(&data),
            Err(e) => debug!("Skipping localhost scan of {}: {}", id, e),
        }
    }
    Ok(())
}

pub(super) async fn reset_info(app: &mut App, _ctx: &HookContext) -> BerthResult<()> {
    app.reset_info();
    Ok(())
}
