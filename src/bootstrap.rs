//! Staged startup
//!
//! A front end asks for the level a command needs and pays for nothing more:
//! `cache path` stops at [`BootstrapLevel::Config`], `task` with no name at
//! [`BootstrapLevel::Tasks`], `poweroff` at [`BootstrapLevel::Engine`], and
//! app lifecycle commands go all the way to [`BootstrapLevel::App`].
//! Levels only move forward.

use crate::app::{App, AppConfig, BuilderRegistry, InitOptions};
use crate::cache::{invalidate_app_caches, AppCacheKeys, CacheStore, SetOptions, TASKS_CACHE_KEY};
use crate::config::{Config, ConfigManager};
use crate::error::{BerthError, BerthResult};
use crate::lifecycle::{HookContext, Lifecycle};
use crate::orchestration::{create_runtimes, default_cli_env, Router, Runtimes};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootstrapLevel {
    /// Configuration, state directories, cache and app discovery
    Config,
    /// The command list
    Tasks,
    /// Container runtime connection
    Engine,
    /// The app, initialized through `ready`
    App,
}

impl BootstrapLevel {
    const ALL: [BootstrapLevel; 4] = [
        BootstrapLevel::Config,
        BootstrapLevel::Tasks,
        BootstrapLevel::Engine,
        BootstrapLevel::App,
    ];
}

/// One entry of the command list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub name: String,
    pub description: String,
    /// Service an app task runs in; `None` for built-in commands
    #[serde(default)]
    pub service: Option<String>,
}

/// Persisted command list, valid for the app root it was discovered in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TaskList {
    root: Option<PathBuf>,
    tasks: Vec<TaskEntry>,
}

const BUILTIN_TASKS: [(&str, &str); 8] = [
    ("start", "Start the app"),
    ("stop", "Stop the app"),
    ("rebuild", "Rebuild images and restart the app"),
    ("destroy", "Remove the app's containers and state"),
    ("info", "Show services, hostnames and health"),
    ("logs", "Show service logs"),
    ("exec", "Run a command in a service"),
    ("poweroff", "Stop every berth container"),
];

/// Walks startup levels in order, keeping what each produced
pub struct Bootstrap {
    cwd: PathBuf,
    config: Arc<Config>,
    level: Option<BootstrapLevel>,
    cache: Option<Arc<CacheStore>>,
    app_config: Option<AppConfig>,
    tasks: Vec<TaskEntry>,
    runtimes: Option<Runtimes>,
    router: Option<Arc<Router>>,
    app: Option<App>,
    lifecycle: Option<Lifecycle>,
}

impl Bootstrap {
    pub fn new(config: Config, cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            config: Arc::new(config),
            level: None,
            cache: None,
            app_config: None,
            tasks: Vec::new(),
            runtimes: None,
            router: None,
            app: None,
            lifecycle: None,
        }
    }

    /// Use these runtimes instead of detecting them at the engine level
    pub fn with_runtimes(mut self, runtimes: Runtimes) -> Self {
        self.runtimes = Some(runtimes);
        self
    }

    /// Highest level reached so far
    pub fn level(&self) -> Option<BootstrapLevel> {
        self.level
    }

    /// Walk every level up to `target`; already reached levels are skipped
    pub async fn advance_to(&mut self, target: BootstrapLevel) -> BerthResult<()> {
        for level in BootstrapLevel::ALL {
            if level > target {
                break;
            }
            if self.level.is_some_and(|current| current >= level) {
                continue;
            }
            debug!("Bootstrapping {:?}", level);
            match level {
                BootstrapLevel::Config => self.load_config().await?,
                BootstrapLevel::Tasks => self.load_tasks().await?,
                BootstrapLevel::Engine => self.connect_engine().await?,
                BootstrapLevel::App => self.load_app().await?,
            }
            self.level = Some(level);
        }
        Ok(())
    }

    async fn load_config(&mut self) -> BerthResult<()> {
        ConfigManager::ensure_state_dirs(&self.config).await?;

        let cache = CacheStore::new(ConfigManager::cache_dir(&self.config))
            .with_default_ttl(Duration::from_secs(self.config.cache.default_ttl_secs));

        if let Some(path) = AppConfig::discover(&self.cwd, &self.config.app.file_name) {
            let app_config = AppConfig::load(&path).await?;
            let keys = AppCacheKeys::for_app(&app_config.name);
            invalidate_app_caches(&cache, &keys, app_config.recipe.as_deref()).await?;
            if !cache.has(&keys.compose).await {
                cache.remove(TASKS_CACHE_KEY).await?;
            }
            self.app_config = Some(app_config);
        }

        self.cache = Some(Arc::new(cache));
        Ok(())
    }

    async fn load_tasks(&mut self) -> BerthResult<()> {
        let cache = self.cache()?.clone();
        let root = self.app_config.as_ref().map(AppConfig::root);

        if let Some(cached) = cache.get::<TaskList>(TASKS_CACHE_KEY).await {
            if cached.root == root {
                debug!("Using cached task list");
                self.tasks = cached.tasks;
                return Ok(());
            }
        }

        let mut tasks: Vec<TaskEntry> = BUILTIN_TASKS
            .iter()
            .map(|(name, description)| TaskEntry {
                name: name.to_string(),
                description: description.to_string(),
                service: None,
            })
            .collect();
        if let Some(app_config) = &self.app_config {
            tasks.extend(app_config.tooling.iter().map(|(name, tooling)| TaskEntry {
                name: name.clone(),
                description: tooling
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Runs in {}", tooling.service)),
                service: Some(tooling.service.clone()),
            }));
        }

        let list = TaskList { root, tasks };
        cache.set(TASKS_CACHE_KEY, &list, SetOptions::persistent()).await?;
        self.tasks = list.tasks;
        Ok(())
    }

    async fn connect_engine(&mut self) -> BerthResult<()> {
        let runtimes = match self.runtimes.take() {
            Some(runtimes) => runtimes,
            None => create_runtimes(&self.config).await?,
        };
        if !runtimes.engine.is_available().await? {
            return Err(BerthError::EngineNotFound(self.config.engine.engine_bin.clone()));
        }
        info!("Using {} on {}", runtimes.engine.runtime_name(), runtimes.platform.name());

        let router = Router::new(runtimes.compose.clone(), runtimes.engine.clone())
            .with_cli_env(default_cli_env(runtimes.platform.host_os()));
        self.router = Some(Arc::new(router));
        self.runtimes = Some(runtimes);
        Ok(())
    }

    async fn load_app(&mut self) -> BerthResult<()> {
        let app_config = self
            .app_config
            .clone()
            .ok_or_else(|| BerthError::AppNotFound(self.cwd.clone()))?;
        let ctx = HookContext::new(
            self.config.clone(),
            self.cache()?.clone(),
            self.router()?.clone(),
            Arc::new(BuilderRegistry::default()),
        );
        let lifecycle = Lifecycle::for_app(&app_config, ctx);
        let mut app = App::new(app_config, &self.config);
        app.init(&lifecycle, InitOptions::default()).await?;

        self.app = Some(app);
        self.lifecycle = Some(lifecycle);
        Ok(())
    }

    fn not_reached(level: BootstrapLevel) -> BerthError {
        BerthError::Internal(format!("bootstrap has not reached {:?}", level))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn cache(&self) -> BerthResult<&Arc<CacheStore>> {
        self.cache
            .as_ref()
            .ok_or_else(|| Self::not_reached(BootstrapLevel::Config))
    }

    /// The discovered app file, if there is one
    pub fn app_config(&self) -> Option<&AppConfig> {
        self.app_config.as_ref()
    }

    pub fn tasks(&self) -> &[TaskEntry] {
        &self.tasks
    }

    pub fn router(&self) -> BerthResult<&Arc<Router>> {
        self.router
            .as_ref()
            .ok_or_else(|| Self::not_reached(BootstrapLevel::Engine))
    }

    pub fn runtimes(&self) -> BerthResult<&Runtimes> {
        self.runtimes
            .as_ref()
            .ok_or_else(|| Self::not_reached(BootstrapLevel::Engine))
    }

    /// The initialized app and the lifecycle driving it
    pub fn app(&mut self) -> BerthResult<(&mut App, &Lifecycle)> {
        match (self.app.as_mut(), self.lifecycle.as_ref()) {
            (Some(app), Some(lifecycle)) => Ok((app, lifecycle)),
            _ => Err(Self::not_reached(BootstrapLevel::App)),
        }
    }
}
