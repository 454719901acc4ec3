//! Info command - services, hostnames and health

use crate::app::{Health, ServiceInfo};
use crate::bootstrap::BootstrapLevel;
use crate::cli::args::{InfoArgs, OutputFormat};
use crate::config::Config;
use crate::error::{BerthError, BerthResult};
use crate::ui::{self, UiContext};
use serde_json::{Map, Value};

/// Execute the info command
pub async fn execute(args: InfoArgs, config: &Config) -> BerthResult<()> {
    let mut bootstrap = super::bootstrap(config, BootstrapLevel::App).await?;
    let (app, lifecycle) = bootstrap.app()?;

    if let Some(unknown) = args.service.iter().find(|s| app.service(s).is_none()) {
        return Err(BerthError::User(format!("{} has no service {}", app.name, unknown)));
    }
    let selected: Vec<&ServiceInfo> = app
        .info
        .iter()
        .filter(|i| args.service.is_empty() || args.service.contains(&i.service))
        .collect();

    if args.deep {
        let mut scanned = Map::new();
        for info in &selected {
            let data = lifecycle
                .ctx()
                .router
                .scan(&app.service_directive(&info.service))
                .await?;
            scanned.insert(info.service.clone(), data.unwrap_or(Value::Null));
        }
        println!("{}", serde_json::to_string_pretty(&scanned)?);
        return Ok(());
    }

    let engine = lifecycle.ctx().engine();
    let mut running = Vec::with_capacity(selected.len());
    for info in &selected {
        let up = match app.containers.get(&info.service) {
            Some(id) => engine.is_running(id).await?,
            None => false,
        };
        running.push(up);
    }

    match args.format {
        OutputFormat::Json => print_json(&selected, &running)?,
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::section(&ctx, &format!("{} ({})", app.name, app.root.display()));
            for (info, up) in selected.iter().zip(running) {
                print_service(&ctx, info, up);
            }
        }
    }
    Ok(())
}

fn print_service(ctx: &UiContext, info: &ServiceInfo, running: bool) {
    ui::section(ctx, &info.service);
    ui::key_value(ctx, "type", &info.kind);
    ui::key_value_status(ctx, "status", if running { "running" } else { "stopped" }, running);
    if info.healthy != Health::Unknown {
        let healthy = info.healthy == Health::Healthy;
        ui::key_value_status(ctx, "health", if healthy { "healthy" } else { "unhealthy" }, healthy);
    }
    for hostname in &info.hostnames {
        ui::key_value(ctx, "hostname", hostname);
    }
    for url in &info.urls {
        ui::key_value(ctx, "url", url);
    }
}

fn print_json(infos: &[&ServiceInfo], running: &[bool]) -> BerthResult<()> {
    #[derive(serde::Serialize)]
    struct ServiceJson<'a> {
        #[serde(flatten)]
        info: &'a ServiceInfo,
        running: bool,
    }

    let services: Vec<ServiceJson> = infos
        .iter()
        .zip(running)
        .map(|(info, &running)| ServiceJson { info, running })
        .collect();

    println!("{}", serde_json::to_string_pretty(&services)?);
    Ok(())
}
