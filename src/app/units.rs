//! Compose unit rendering
//!
//! An app is backed by two compose files in its own directory:
//! `globals.json` (labels, environment, shared network) and `services.json`
//! (the service fragments). Compose reads JSON as YAML.

use crate::app::App;
use crate::error::{BerthError, BerthResult};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const GLOBALS_FILE: &str = "globals.json";
pub const SERVICES_FILE: &str = "services.json";

/// Labels, environment and bridge network aliases for every service
pub fn globals_document(app: &App) -> Value {
    let mut services = Map::new();
    for service in app.services() {
        let mut labels = app.labels.clone();
        labels.insert("io.berth.service".to_string(), service.name.clone());

        let mut networks = Map::new();
        networks.insert("default".to_string(), json!({}));
        networks.insert(
            app.bridge_network().to_string(),
            json!({ "aliases": [app.hostname_for(&service.name)] }),
        );

        services.insert(
            service.name.clone(),
            json!({
                "labels": labels,
                "environment": app.env(),
                "networks": networks,
            }),
        );
    }

    let mut top_networks = Map::new();
    top_networks.insert(
        app.bridge_network().to_string(),
        json!({ "name": app.bridge_network(), "external": true }),
    );

    json!({
        "services": services,
        "networks": top_networks,
    })
}

/// The declared service fragments
pub fn services_document(app: &App) -> Value {
    let services: Map<String, Value> = app
        .services()
        .iter()
        .map(|s| (s.name.clone(), s.fragment.clone()))
        .collect();
    json!({ "services": services })
}

/// Write `documents` into `dir`, returning their paths in order
pub async fn write_units(dir: &Path, documents: &[(&str, Value)]) -> BerthResult<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| BerthError::io(format!("creating {}", dir.display()), e))?;

    let mut paths = Vec::with_capacity(documents.len());
    for (name, document) in documents {
        let path = dir.join(name);
        let content = serde_json::to_string_pretty(document)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| BerthError::io(format!("writing {}", path.display()), e))?;
        debug!("Wrote compose unit {}", path.display());
        paths.push(path);
    }
    Ok(paths)
}

/// Remove files in `dir` that are not in `keep`
pub async fn remove_danglers(dir: &Path, keep: &[PathBuf]) -> BerthResult<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(BerthError::io(format!("reading {}", dir.display()), e)),
    };

    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BerthError::io(format!("reading {}", dir.display()), e))?
    {
        let path = entry.path();
        if keep.contains(&path) {
            continue;
        }
        let result = if path.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => info!("Could not remove dangling compose file {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}
