//! Compose cache snapshots
//!
//! The derived part of an [`App`] persisted at `ready`. Restoring one lets
//! initialization skip service discovery and compose regeneration.

use crate::app::{App, AppConfig, BuildPlan, ServiceDescriptor, ServiceInfo};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// Digest of an app config's declared content
pub fn config_digest(config: &AppConfig) -> String {
    let content = serde_json::to_string(config).unwrap_or_default();
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeSnapshot {
    pub name: String,
    pub project: String,
    pub root: PathBuf,
    /// Digest of the app file the services were derived from
    #[serde(default)]
    pub config_digest: String,
    pub services: Vec<ServiceDescriptor>,
    pub compose_units: Vec<PathBuf>,
    #[serde(default)]
    pub containers: BTreeMap<String, String>,
    #[serde(default)]
    pub info: Vec<ServiceInfo>,
    #[serde(default)]
    pub plan: BuildPlan,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl App {
    /// Derived state worth caching; urls and hostnames are re-derived on load
    pub fn snapshot(&self) -> ComposeSnapshot {
        let info = self
            .info
            .iter()
            .cloned()
            .map(|mut i| {
                i.urls.clear();
                i.hostnames.clear();
                i
            })
            .collect();

        ComposeSnapshot {
            name: self.name.clone(),
            project: self.project.clone(),
            root: self.root.clone(),
            config_digest: config_digest(&self.config),
            services: self.services.clone(),
            compose_units: self.compose_units.clone(),
            containers: self.containers.clone(),
            info,
            plan: self.plan.clone(),
            env: self.env.clone(),
        }
    }

    /// Adopt a snapshot, returning false when it does not fit this app
    ///
    /// A snapshot taken for another project, root or app file content, or
    /// one whose compose units are gone from disk, is rejected and leaves the
    /// app untouched.
    pub fn restore(&mut self, snapshot: ComposeSnapshot) -> bool {
        if snapshot.project != self.project || snapshot.root != self.root {
            debug!("Compose cache belongs to {} at {}", snapshot.project, snapshot.root.display());
            return false;
        }
        if snapshot.config_digest != config_digest(&self.config) {
            debug!("App file for {} changed since its compose cache was written", self.name);
            return false;
        }
        if snapshot.compose_units.is_empty() || snapshot.compose_units.iter().any(|u| !u.is_file()) {
            debug!("Compose cache for {} points at missing compose files", self.name);
            return false;
        }

        self.services = snapshot.services;
        self.compose_units = snapshot.compose_units;
        self.containers = snapshot.containers;
        self.info = snapshot.info;
        self.plan = snapshot.plan;
        self.env.extend(snapshot.env);
        self.units_stale = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::app::{App, AppConfig, Health, ServiceDescriptor};
    use crate::config::Config;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn app(temp: &TempDir, root: &str) -> App {
        let mut settings = Config::default();
        settings.app.data_dir = Some(temp.path().to_path_buf());
        let config = AppConfig {
            name: "demo".to_string(),
            path: PathBuf::from(root).join(".berth.toml"),
            ..Default::default()
        };
        App::new(config, &settings)
    }

    async fn built(temp: &TempDir) -> App {
        let mut app = app(temp, "/srv/demo");
        app.add_service(ServiceDescriptor {
            name: "web".to_string(),
            kind: "compose".to_string(),
            fragment: json!({"image": "nginx"}),
            build_steps: vec!["make".to_string()],
            run_steps: Vec::new(),
        })
        .unwrap();
        app.regenerate_compose_units().await.unwrap();
        app.info[0].hostnames.push("web.demo.internal".to_string());
        app.info[0].urls.push("http://localhost:8080".to_string());
        app.info[0].healthy = Health::Healthy;
        app
    }

    #[tokio::test]
    async fn restore_reproduces_derived_state() {
        let temp = TempDir::new().unwrap();
        let original = built(&temp).await;
        let snapshot = original.snapshot();
        assert!(snapshot.info[0].hostnames.is_empty());
        assert!(snapshot.info[0].urls.is_empty());

        let mut fresh = app(&temp, "/srv/demo");
        assert!(fresh.restore(snapshot));
        assert_eq!(fresh.services(), original.services());
        assert_eq!(fresh.compose_units, original.compose_units);
        assert_eq!(fresh.plan, original.plan);
        assert!(!fresh.units_stale());
        fresh.mark_initialized().unwrap();
    }

    #[tokio::test]
    async fn snapshot_survives_json() {
        let temp = TempDir::new().unwrap();
        let snapshot = built(&temp).await.snapshot();
        let text = serde_json::to_string(&snapshot).unwrap();
        let parsed: super::ComposeSnapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[tokio::test]
    async fn snapshot_from_another_root_is_rejected() {
        let temp = TempDir::new().unwrap();
        let snapshot = built(&temp).await.snapshot();

        let mut elsewhere = app(&temp, "/srv/other");
        assert!(!elsewhere.restore(snapshot));
        assert!(elsewhere.services().is_empty());
    }

    #[tokio::test]
    async fn snapshot_of_edited_app_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let snapshot = built(&temp).await.snapshot();

        let mut edited = app(&temp, "/srv/demo");
        edited.config.recipe = Some("lemp".to_string());
        assert!(!edited.restore(snapshot));
    }

    #[tokio::test]
    async fn snapshot_with_missing_units_is_rejected() {
        let temp = TempDir::new().unwrap();
        let original = built(&temp).await;
        let snapshot = original.snapshot();
        std::fs::remove_file(&original.compose_units[1]).unwrap();

        let mut fresh = app(&temp, "/srv/demo");
        assert!(!fresh.restore(snapshot));
    }
}
