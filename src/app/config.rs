//! Per-app configuration (`.berth.toml`)
//!
//! Example:
//!
//! ```toml
//! name = "demo"
//! recipe = "lamp"
//!
//! [services.web]
//! image = "nginx:1.27"
//! build_steps = ["composer install"]
//!
//! [services.web.compose]
//! ports = ["8080:80"]
//!
//! [events]
//! post-start = ["echo started", { web = "php -v" }]
//!
//! [tooling.php]
//! service = "web"
//! cmd = "php"
//! ```

use crate::error::{BerthError, BerthResult};
use crate::lifecycle::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One service declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Builder that turns this declaration into a compose service
    #[serde(rename = "type")]
    pub kind: Option<String>,

    /// Image to pull
    pub image: Option<String>,

    /// Build context, relative to the app root
    pub build: Option<PathBuf>,

    /// Commands run in the service before the app starts
    pub build_steps: Vec<String>,

    /// Commands run in the service after the app starts
    pub run_steps: Vec<String>,

    /// Raw compose service fragment merged into the generated service
    pub compose: serde_json::Map<String, serde_json::Value>,
}

/// A command attached to a lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventCommand {
    /// Runs in the app's first service
    Plain(String),
    /// `{ service = "command" }`
    Targeted(BTreeMap<String, String>),
}

impl EventCommand {
    /// `(service, command)` pairs, with `default_service` for plain commands
    pub fn resolve(&self, default_service: Option<&str>) -> Vec<(Option<String>, String)> {
        match self {
            EventCommand::Plain(cmd) => vec![(default_service.map(String::from), cmd.clone())],
            EventCommand::Targeted(map) => map
                .iter()
                .map(|(service, cmd)| (Some(service.clone()), cmd.clone()))
                .collect(),
        }
    }
}

/// A user-defined command exposed as a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolingConfig {
    pub service: String,
    pub cmd: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

/// Parsed app file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,

    #[serde(default)]
    pub recipe: Option<String>,

    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,

    #[serde(default)]
    pub events: BTreeMap<String, Vec<EventCommand>>,

    #[serde(default)]
    pub tooling: BTreeMap<String, ToolingConfig>,

    /// File this config was read from
    #[serde(skip)]
    pub path: PathBuf,
}

impl AppConfig {
    /// Find `file_name` in `start` or the nearest parent directory
    pub fn discover(start: &Path, file_name: &str) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(file_name))
            .find(|candidate| candidate.is_file())
    }

    /// Read and validate an app file
    pub async fn load(path: &Path) -> BerthResult<Self> {
        debug!("Loading app config from {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BerthError::io(format!("reading {}", path.display()), e))?;
        Self::parse(&content, path)
    }

    /// Parse app file contents read from `path`
    pub fn parse(content: &str, path: &Path) -> BerthResult<Self> {
        let mut config: AppConfig =
            toml::from_str(content).map_err(|e| BerthError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.path = path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> BerthResult<()> {
        if super::project_slug(&self.name).is_empty() {
            return Err(BerthError::ConfigInvalid {
                path: self.path.clone(),
                reason: format!("app name {:?} has no letters or digits", self.name),
            });
        }
        for phase in self.events.keys() {
            phase.parse::<Phase>()?;
        }
        for (task, tooling) in &self.tooling {
            if !self.services.contains_key(&tooling.service) {
                return Err(BerthError::ConfigInvalid {
                    path: self.path.clone(),
                    reason: format!("task {} uses unknown service {}", task, tooling.service),
                });
            }
        }
        Ok(())
    }

    /// Directory holding the app file
    pub fn root(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Events keyed by phase
    pub fn phase_events(&self) -> Vec<(Phase, Vec<EventCommand>)> {
        self.events
            .iter()
            .filter_map(|(name, cmds)| name.parse::<Phase>().ok().map(|p| (p, cmds.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DEMO: &str = r#"
name = "demo"
recipe = "lamp"

[services.web]
image = "nginx:1.27"
build_steps = ["composer install"]

[services.web.compose]
ports = ["8080:80"]

[services.db]
type = "compose"
build = "docker/db"

[events]
post-start = ["echo started", { db = "mysql -V" }]

[tooling.php]
service = "web"
cmd = "php"
"#;

    #[test]
    fn parses_full_app_file() {
        let config = AppConfig::parse(DEMO, Path::new("/srv/demo/.berth.toml")).unwrap();
        assert_eq!(config.name, "demo");
        assert_eq!(config.recipe.as_deref(), Some("lamp"));
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services["web"].build_steps, vec!["composer install"]);
        assert_eq!(config.services["web"].compose["ports"][0], "8080:80");
        assert_eq!(config.services["db"].build, Some(PathBuf::from("docker/db")));
        assert_eq!(config.root(), PathBuf::from("/srv/demo"));
        assert_eq!(config.tooling["php"].cmd, "php");

        let events = config.phase_events();
        assert_eq!(events[0].0, Phase::PostStart);
        assert_eq!(events[0].1.len(), 2);
    }

    #[test]
    fn event_commands_resolve_services() {
        let plain = EventCommand::Plain("ls".to_string());
        assert_eq!(
            plain.resolve(Some("web")),
            vec![(Some("web".to_string()), "ls".to_string())]
        );

        let targeted = EventCommand::Targeted(BTreeMap::from([(
            "db".to_string(),
            "mysql -V".to_string(),
        )]));
        assert_eq!(
            targeted.resolve(Some("web")),
            vec![(Some("db".to_string()), "mysql -V".to_string())]
        );
    }

    #[test]
    fn unknown_event_phase_is_rejected() {
        let err = AppConfig::parse(
            "name = \"demo\"\n[events]\nafter-lunch = [\"ls\"]\n",
            Path::new("/x/.berth.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, BerthError::UnknownPhase(_)));
    }

    #[test]
    fn tooling_must_target_known_service() {
        let err = AppConfig::parse(
            "name = \"demo\"\n[tooling.php]\nservice = \"web\"\ncmd = \"php\"\n",
            Path::new("/x/.berth.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, BerthError::ConfigInvalid { .. }));
    }

    #[test]
    fn unnamed_app_is_rejected() {
        let err = AppConfig::parse("name = \"--\"\n", Path::new("/x/.berth.toml")).unwrap_err();
        assert!(matches!(err, BerthError::ConfigInvalid { .. }));
    }

    #[test]
    fn invalid_toml_reports_path() {
        let err = AppConfig::parse("name = ", Path::new("/x/.berth.toml")).unwrap_err();
        assert!(err.to_string().contains("/x/.berth.toml"));
    }

    #[test]
    fn discovers_from_nested_directory() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("src/deep");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join(".berth.toml"), "name = \"demo\"\n").unwrap();

        let found = AppConfig::discover(&nested, ".berth.toml").unwrap();
        assert_eq!(found, temp.path().join(".berth.toml"));
    }

    #[test]
    fn discovery_without_app_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(AppConfig::discover(temp.path(), ".berth-test-missing.toml").is_none());
    }

    #[tokio::test]
    async fn load_reads_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".berth.toml");
        tokio::fs::write(&path, DEMO).await.unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.path, path);
        assert_eq!(config.root(), temp.path());
    }
}
