//! Application model
//!
//! An [`App`] is the mutable model of one project: its services, the compose
//! files generated from them, the containers the runtime reports, and
//! per-service observed state. Phase handlers mutate it; the compose cache
//! persists a snapshot of it.

pub mod config;
mod operations;
pub mod services;
mod snapshot;
pub mod units;

pub use config::{AppConfig, EventCommand, ServiceConfig, ToolingConfig};
pub use operations::InitOptions;
pub use services::{BuilderRegistry, ComposeServiceBuilder, ServiceBuilder, ServiceDescriptor};
pub use snapshot::ComposeSnapshot;

use crate::cache::{AppCacheKeys, AppMeta};
use crate::config::{Config, ConfigManager};
use crate::error::{BerthError, BerthResult};
use crate::orchestration::{labels, Directive};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// In-container path the app root is mounted at
pub const WEBROOT: &str = "/app";

/// Runtime-safe project name: lowercase ASCII alphanumerics only
pub fn project_slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Stable app id: first 12 hex chars of SHA-256 over name and root
pub fn app_id(name: &str, root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(root.to_string_lossy().as_bytes());
    hex::encode(&hasher.finalize()[..6])
}

/// Observed health of a service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

/// Per-service observed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub healthy: Health,
}

impl ServiceInfo {
    fn for_service(service: &ServiceDescriptor) -> Self {
        Self {
            service: service.name.clone(),
            kind: service.kind.clone(),
            urls: Vec::new(),
            hostnames: Vec::new(),
            healthy: Health::Unknown,
        }
    }
}

/// Which services are pulled and which are built locally
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub pullable: Vec<String>,
    pub local: Vec<String>,
}

/// One project
#[derive(Debug, Clone)]
pub struct App {
    pub name: String,
    pub project: String,
    pub root: PathBuf,
    pub id: String,
    pub recipe: Option<String>,
    services: Vec<ServiceDescriptor>,
    /// Compose files backing the current services
    pub compose_units: Vec<PathBuf>,
    /// Service name to container id
    pub containers: BTreeMap<String, String>,
    pub info: Vec<ServiceInfo>,
    pub cache_keys: AppCacheKeys,
    env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub meta: AppMeta,
    /// Notices for the user (rebuild advice, non-fatal failures)
    pub messages: Vec<String>,
    pub plan: BuildPlan,
    pub config: AppConfig,
    compose_dir: PathBuf,
    bridge_network: String,
    units_stale: bool,
    initialized: bool,
}

impl App {
    /// Model an app from its config, with no services yet
    pub fn new(config: AppConfig, settings: &Config) -> Self {
        let name = config.name.clone();
        let project = project_slug(&name);
        let root = config.root();
        let id = app_id(&name, &root);
        let compose_dir = ConfigManager::compose_dir(settings).join(format!("{}-{}", name, id));
        let root_str = root.display().to_string();

        let env = BTreeMap::from([
            ("BERTH_APP_PROJECT".to_string(), project.clone()),
            ("BERTH_APP_NAME".to_string(), name.clone()),
            ("BERTH_APP_ROOT".to_string(), root_str.clone()),
            ("BERTH_APP_ROOT_BIND".to_string(), root_str.clone()),
            (
                "BERTH_APP_COMMON_NAME".to_string(),
                project.chars().take(64).collect(),
            ),
            ("BERTH_WEBROOT".to_string(), WEBROOT.to_string()),
        ]);

        let labels = BTreeMap::from([
            (labels::INSTANCE.to_string(), settings.engine.instance.clone()),
            (labels::PROJECT.to_string(), project.clone()),
            (labels::ROOT.to_string(), root_str),
            (labels::SRC.to_string(), config.path.display().to_string()),
        ]);

        Self {
            cache_keys: AppCacheKeys::for_app(&name),
            recipe: config.recipe.clone(),
            name,
            project,
            root,
            id,
            services: Vec::new(),
            compose_units: Vec::new(),
            containers: BTreeMap::new(),
            info: Vec::new(),
            env,
            labels,
            meta: AppMeta::default(),
            messages: Vec::new(),
            plan: BuildPlan::default(),
            config,
            compose_dir,
            bridge_network: settings.engine.bridge_network.clone(),
            units_stale: false,
            initialized: false,
        }
    }

    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Add a service; names are unique
    pub fn add_service(&mut self, service: ServiceDescriptor) -> BerthResult<()> {
        if self.service(&service.name).is_some() {
            return Err(BerthError::DuplicateService(service.name));
        }
        debug!("Adding service {} ({})", service.name, service.kind);
        self.info.push(ServiceInfo::for_service(&service));
        self.services.push(service);
        self.refresh_plan();
        self.units_stale = true;
        Ok(())
    }

    /// Environment injected into every service
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Set an environment variable; a changed value makes the compose units stale
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let previous = self.env.insert(key.into(), value.clone());
        if previous.as_deref() != Some(value.as_str()) {
            self.units_stale = true;
        }
    }

    /// Recompute pullable and local services
    pub fn refresh_plan(&mut self) {
        let (local, pullable): (Vec<_>, Vec<_>) =
            self.services.iter().partition(|s| s.is_local());
        self.plan = BuildPlan {
            pullable: pullable.into_iter().map(|s| s.name.clone()).collect(),
            local: local.into_iter().map(|s| s.name.clone()).collect(),
        };
    }

    /// Directory holding this app's compose units
    pub fn compose_dir(&self) -> &Path {
        &self.compose_dir
    }

    pub fn bridge_network(&self) -> &str {
        &self.bridge_network
    }

    /// Hostname a service answers to on the bridge network
    pub fn hostname_for(&self, service: &str) -> String {
        format!("{}.{}.internal", service, self.project)
    }

    pub fn units_stale(&self) -> bool {
        self.units_stale
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Write compose units for the current services and drop leftovers
    pub async fn regenerate_compose_units(&mut self) -> BerthResult<()> {
        let documents = [
            (units::GLOBALS_FILE, units::globals_document(self)),
            (units::SERVICES_FILE, units::services_document(self)),
        ];
        let paths = units::write_units(&self.compose_dir, &documents).await?;
        units::remove_danglers(&self.compose_dir, &paths).await?;
        self.compose_units = paths;
        self.units_stale = false;
        Ok(())
    }

    /// Declare the model safe to read
    pub fn mark_initialized(&mut self) -> BerthResult<()> {
        if self.units_stale {
            return Err(BerthError::StaleComposeUnits(self.name.clone()));
        }
        self.initialized = true;
        Ok(())
    }

    /// Compose directive for the whole project
    pub fn directive(&self) -> Directive {
        let mut directive = Directive::compose(self.project.clone(), self.compose_units.clone());
        directive.opts.pullable = self.plan.pullable.clone();
        directive.opts.local = self.plan.local.clone();
        directive
    }

    /// Compose directive narrowed to one service
    pub fn service_directive(&self, service: &str) -> Directive {
        Directive::compose(self.project.clone(), self.compose_units.clone()).with_services([service])
    }

    /// First declared service, the target of untargeted commands
    pub fn primary_service(&self) -> Option<&str> {
        self.services.first().map(|s| s.name.as_str())
    }

    /// Clear observed state after the app stops
    pub fn reset_info(&mut self) {
        for info in &mut self.info {
            info.urls.clear();
            info.healthy = Health::Unknown;
        }
    }

    /// `BERTH_INFO` payload: stable per-service info keyed by service
    pub fn info_env(&self) -> BerthResult<String> {
        let info: serde_json::Map<String, serde_json::Value> = self
            .info
            .iter()
            .map(|i| {
                (
                    i.service.clone(),
                    serde_json::json!({
                        "service": i.service,
                        "type": i.kind,
                        "hostnames": i.hostnames,
                    }),
                )
            })
            .collect();
        Ok(serde_json::to_string(&info)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn settings(temp: &TempDir) -> Config {
        let mut config = Config::default();
        config.app.data_dir = Some(temp.path().to_path_buf());
        config
    }

    fn demo_config() -> AppConfig {
        AppConfig {
            name: "My Demo_App".to_string(),
            path: PathBuf::from("/srv/demo/.berth.toml"),
            ..Default::default()
        }
    }

    fn service(name: &str, fragment: serde_json::Value) -> ServiceDescriptor {
        ServiceDescriptor {
            name: name.to_string(),
            kind: "compose".to_string(),
            fragment,
            build_steps: Vec::new(),
            run_steps: Vec::new(),
        }
    }

    #[test]
    fn slug_drops_everything_but_alphanumerics() {
        assert_eq!(project_slug("My Demo_App"), "mydemoapp");
        assert_eq!(project_slug("web-2.0"), "web20");
    }

    #[test]
    fn id_is_stable_and_root_sensitive() {
        let a = app_id("demo", Path::new("/srv/demo"));
        assert_eq!(a, app_id("demo", Path::new("/srv/demo")));
        assert_ne!(a, app_id("demo", Path::new("/srv/other")));
        assert_eq!(a.len(), 12);
    }

    #[test]
    fn new_app_derives_identity_and_env() {
        let temp = TempDir::new().unwrap();
        let app = App::new(demo_config(), &settings(&temp));

        assert_eq!(app.project, "mydemoapp");
        assert_eq!(app.root, PathBuf::from("/srv/demo"));
        assert_eq!(app.cache_keys.compose, "My Demo_App.compose.cache");
        assert_eq!(app.env()["BERTH_APP_PROJECT"], "mydemoapp");
        assert_eq!(app.env()["BERTH_APP_ROOT_BIND"], "/srv/demo");
        assert_eq!(app.env()["BERTH_WEBROOT"], "/app");
        assert_eq!(app.labels[labels::SRC], "/srv/demo/.berth.toml");
        assert!(app.compose_dir().starts_with(temp.path()));
        assert!(!app.is_initialized());
    }

    #[test]
    fn common_name_is_truncated() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig {
            name: "a".repeat(80),
            path: PathBuf::from("/srv/x/.berth.toml"),
            ..Default::default()
        };
        let app = App::new(config, &settings(&temp));
        assert_eq!(app.env()["BERTH_APP_COMMON_NAME"].len(), 64);
    }

    #[test]
    fn duplicate_service_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut app = App::new(demo_config(), &settings(&temp));
        app.add_service(service("web", json!({"image": "nginx"}))).unwrap();

        let err = app
            .add_service(service("web", json!({"image": "httpd"})))
            .unwrap_err();
        assert!(matches!(err, BerthError::DuplicateService(name) if name == "web"));
        assert_eq!(app.services().len(), 1);
    }

    #[test]
    fn plan_splits_local_and_pullable() {
        let temp = TempDir::new().unwrap();
        let mut app = App::new(demo_config(), &settings(&temp));
        app.add_service(service("web", json!({"build": "/srv/demo"}))).unwrap();
        app.add_service(service("db", json!({"image": "mariadb"}))).unwrap();

        assert_eq!(app.plan.local, vec!["web"]);
        assert_eq!(app.plan.pullable, vec!["db"]);
        assert_eq!(app.directive().opts.local, vec!["web"]);
    }

    #[tokio::test]
    async fn stale_units_block_initialization() {
        let temp = TempDir::new().unwrap();
        let mut app = App::new(demo_config(), &settings(&temp));
        app.add_service(service("web", json!({"image": "nginx"}))).unwrap();

        assert!(matches!(
            app.mark_initialized(),
            Err(BerthError::StaleComposeUnits(_))
        ));

        app.regenerate_compose_units().await.unwrap();
        app.mark_initialized().unwrap();
        assert!(app.is_initialized());
    }

    #[tokio::test]
    async fn regenerated_units_describe_services() {
        let temp = TempDir::new().unwrap();
        let mut app = App::new(demo_config(), &settings(&temp));
        app.add_service(service("web", json!({"image": "nginx"}))).unwrap();
        app.regenerate_compose_units().await.unwrap();

        assert_eq!(app.compose_units.len(), 2);
        let globals: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&app.compose_units[0]).unwrap()).unwrap();
        let services: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&app.compose_units[1]).unwrap()).unwrap();

        let web = &globals["services"]["web"];
        assert_eq!(web["labels"][labels::PROJECT], "mydemoapp");
        assert_eq!(web["labels"][labels::INSTANCE], "berth");
        assert_eq!(web["environment"]["BERTH_APP_NAME"], "My Demo_App");
        assert_eq!(
            web["networks"]["berth_bridge_network"]["aliases"][0],
            "web.mydemoapp.internal"
        );
        assert_eq!(globals["networks"]["berth_bridge_network"]["external"], true);
        assert_eq!(services["services"]["web"]["image"], "nginx");
    }

    #[test]
    fn unchanged_env_keeps_units_fresh() {
        let temp = TempDir::new().unwrap();
        let mut app = App::new(demo_config(), &settings(&temp));
        app.set_env("BERTH_APP_NAME", "My Demo_App");
        assert!(!app.units_stale());
        app.set_env("BERTH_INFO", "[]");
        assert!(app.units_stale());
    }

    #[test]
    fn reset_info_clears_observations() {
        let temp = TempDir::new().unwrap();
        let mut app = App::new(demo_config(), &settings(&temp));
        app.add_service(service("web", json!({"image": "nginx"}))).unwrap();
        app.info[0].urls.push("http://localhost".to_string());
        app.info[0].hostnames.push("web.mydemoapp.internal".to_string());
        app.info[0].healthy = Health::Healthy;

        app.reset_info();

        assert!(app.info[0].urls.is_empty());
        assert_eq!(app.info[0].healthy, Health::Unknown);
        assert_eq!(app.info[0].hostnames.len(), 1);
    }
}
