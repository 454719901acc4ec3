//! Lifecycle operations
//!
//! Each operation emits its phases around one router call. Handlers do the
//! rest (builds, caches, health, teardown).

use crate::app::{App, ComposeSnapshot};
use crate::cache::AppMeta;
use crate::error::{BerthError, BerthResult};
use crate::lifecycle::{Lifecycle, Phase};
use tracing::{debug, info};

/// How far initialization goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitOptions {
    /// Emit the `*-engine` phases, which talk to the container runtime
    pub engine: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self { engine: true }
    }
}

impl App {
    /// Load a cached model or derive it, then bring the app to `ready`
    pub async fn init(&mut self, lifecycle: &Lifecycle, opts: InitOptions) -> BerthResult<()> {
        let ctx = lifecycle.ctx();
        self.meta = AppMeta::load(&ctx.cache, &self.cache_keys).await;

        let cached = ctx.cache.get::<ComposeSnapshot>(&self.cache_keys.compose).await;
        let restored = match cached {
            Some(snapshot) => self.restore(snapshot),
            None => false,
        };
        if restored {
            debug!("Loaded {} from compose cache", self.name);
        } else {
            lifecycle.emit(Phase::PreInit, self).await?;
            self.regenerate_compose_units().await?;
        }

        lifecycle.emit(Phase::PostInit, self).await?;
        if opts.engine {
            lifecycle.emit(Phase::PostInitEngine, self).await?;
        }
        if self.units_stale() {
            self.regenerate_compose_units().await?;
        }
        self.mark_initialized()?;

        lifecycle.emit(Phase::Ready, self).await?;
        if opts.engine {
            lifecycle.emit(Phase::ReadyEngine, self).await?;
        }
        lifecycle.emit(Phase::ReadyV4, self).await?;
        Ok(())
    }

    fn ensure_initialized(&self) -> BerthResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(BerthError::Internal(format!("{} was used before init", self.name)))
        }
    }

    pub async fn start(&mut self, lifecycle: &Lifecycle) -> BerthResult<()> {
        self.ensure_initialized()?;
        lifecycle.emit(Phase::PreStart, self).await?;
        info!("Starting {}", self.name);
        lifecycle
            .ctx()
            .router
            .start(&[self.directive()])
            .await
            .into_result()?;
        lifecycle.emit(Phase::PostStart, self).await?;
        Ok(())
    }

    pub async fn stop(&mut self, lifecycle: &Lifecycle, kill: bool) -> BerthResult<()> {
        self.ensure_initialized()?;
        lifecycle.emit(Phase::PreStop, self).await?;
        info!("Stopping {}", self.name);
        let mut directive = self.directive();
        directive.opts.kill = kill;
        lifecycle
            .ctx()
            .router
            .stop(&[directive])
            .await
            .into_result()?;
        lifecycle.emit(Phase::PostStop, self).await?;
        Ok(())
    }

    /// Stop, remove containers and start again, rebuilding images
    ///
    /// Removing the containers lets `pre-start` clear the build locks, so
    /// the start rebuilds images and reruns build steps.
    pub async fn rebuild(&mut self, lifecycle: &Lifecycle) -> BerthResult<()> {
        self.ensure_initialized()?;
        lifecycle.emit(Phase::PreRebuild, self).await?;
        self.stop(lifecycle, false).await?;
        info!("Removing containers for {}", self.name);
        lifecycle
            .ctx()
            .router
            .destroy(&[self.directive()])
            .await
            .into_result()?;
        self.start(lifecycle).await?;
        lifecycle.emit(Phase::PostRebuild, self).await?;
        Ok(())
    }

    /// Remove containers, and with `purge` networks and volumes too
    pub async fn uninstall(&mut self, lifecycle: &Lifecycle, purge: bool) -> BerthResult<()> {
        self.ensure_initialized()?;
        lifecycle.emit(Phase::PreUninstall, self).await?;
        let mut directive = self.directive();
        directive.opts.purge = purge;
        lifecycle
            .ctx()
            .router
            .destroy(&[directive])
            .await
            .into_result()?;
        lifecycle.emit(Phase::PostUninstall, self).await?;
        Ok(())
    }

    /// Tear everything down and erase the app's persisted state
    pub async fn destroy(&mut self, lifecycle: &Lifecycle) -> BerthResult<()> {
        self.ensure_initialized()?;
        lifecycle.emit(Phase::PreDestroy, self).await?;
        self.stop(lifecycle, false).await?;
        self.uninstall(lifecycle, true).await?;
        lifecycle.emit(Phase::PostDestroy, self).await?;
        info!("Destroyed {}", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppConfig, ServiceConfig};
    use crate::cache::LockGeneration;
    use crate::lifecycle::testing::{test_env, TestEnv};
    use crate::lifecycle::{handler_fn, Lifecycle, RUN_LAST};
    use crate::orchestration::ComposeAction;
    use futures_util::FutureExt;
    use std::sync::{Arc, Mutex};

    async fn init(env: &TestEnv, config: AppConfig) -> (App, Lifecycle) {
        let lifecycle = Lifecycle::for_app(&config, env.ctx.clone());
        let mut app = env.app(config);
        app.init(&lifecycle, InitOptions::default()).await.unwrap();
        (app, lifecycle)
    }

    fn with_build_steps(env: &TestEnv) -> AppConfig {
        let mut config = env.demo_config();
        config.services.get_mut("web").unwrap().build_steps = vec!["make".to_string()];
        config
    }

    #[tokio::test]
    async fn demo_web_scenario() {
        let env = test_env();
        let (mut app, lifecycle) = init(&env, env.demo_config()).await;

        assert!(app.is_initialized());
        assert_eq!(app.service_names(), vec!["web"]);
        assert_eq!(app.compose_units.len(), 2);
        assert_eq!(app.info[0].hostnames, vec!["web.demo.internal"]);
        assert!(app.env().contains_key("BERTH_INFO"));
        assert!(env.fake.snapshot().networks.contains("berth_bridge_network"));
        assert!(env.ctx.cache.exists_on_disk(&app.cache_keys.compose));

        env.fake.publish_port("demo", "web", "80/tcp", 8080);
        app.start(&lifecycle).await.unwrap();
        assert!(env.fake.is_up("demo", "web"));
        assert_eq!(app.containers["web"], "demo-web-1");
        assert_eq!(app.info[0].urls, vec!["http://localhost:8080"]);
        assert_eq!(app.info[0].healthy, crate::app::Health::Healthy);
        assert_eq!(app.meta.built_against.as_deref(), Some("1.0.0"));
        assert!(app.messages.is_empty());

        app.stop(&lifecycle, false).await.unwrap();
        assert!(!env.fake.is_up("demo", "web"));
        assert!(env.fake.exists("demo", "web"));
        assert_eq!(app.info[0].healthy, crate::app::Health::Unknown);
        assert!(app.info[0].urls.is_empty());

        app.destroy(&lifecycle).await.unwrap();
        assert!(!env.fake.exists("demo", "web"));
        for key in app.cache_keys.all() {
            assert!(!env.ctx.cache.exists_on_disk(key), "{} survived destroy", key);
        }
        assert!(!app.compose_dir().exists());
    }

    #[tokio::test]
    async fn cached_init_matches_full_init() {
        let env = test_env();
        let (full, _) = init(&env, env.demo_config()).await;

        let mut lifecycle = Lifecycle::for_app(&env.demo_config(), env.reopen());
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        lifecycle.scheduler_mut().register(
            Phase::PreInit,
            RUN_LAST,
            handler_fn("count", move |_app, _ctx| {
                *counter.lock().unwrap() += 1;
                async { Ok(()) }.boxed()
            }),
        );

        let mut cached = env.app(env.demo_config());
        cached.init(&lifecycle, InitOptions::default()).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(cached.services(), full.services());
        assert_eq!(cached.compose_units, full.compose_units);
        assert_eq!(cached.info, full.info);
        assert_eq!(cached.env(), full.env());
        assert_eq!(cached.plan, full.plan);
    }

    #[tokio::test]
    async fn edited_app_file_skips_the_cache() {
        let env = test_env();
        init(&env, env.demo_config()).await;

        let mut config = env.demo_config();
        config.services.insert(
            "db".to_string(),
            ServiceConfig {
                image: Some("mariadb".to_string()),
                ..Default::default()
            },
        );
        let (app, _) = init(&env, config).await;
        assert_eq!(app.service_names(), vec!["db", "web"]);
    }

    #[tokio::test]
    async fn build_steps_run_on_first_start_only() {
        let env = test_env();
        let (mut app, lifecycle) = init(&env, with_build_steps(&env)).await;

        app.start(&lifecycle).await.unwrap();
        assert_eq!(env.fake.count(ComposeAction::Exec), 1);
        assert!(env.fake.is_up("demo", "web"));

        app.stop(&lifecycle, false).await.unwrap();
        app.start(&lifecycle).await.unwrap();
        assert_eq!(env.fake.count(ComposeAction::Exec), 1);
        assert_eq!(env.fake.count(ComposeAction::Build) + env.fake.count(ComposeAction::Pull), 1);
    }

    #[tokio::test]
    async fn rebuild_reruns_build_steps() {
        let env = test_env();
        let (mut app, lifecycle) = init(&env, with_build_steps(&env)).await;
        app.start(&lifecycle).await.unwrap();

        app.rebuild(&lifecycle).await.unwrap();

        assert_eq!(env.fake.count(ComposeAction::Exec), 2);
        assert_eq!(env.fake.count(ComposeAction::Pull), 2);
        assert!(env.fake.is_up("demo", "web"));
        let keys = app.cache_keys.locks(LockGeneration::V3);
        assert!(env.ctx.cache.has(keys[0]).await);
    }

    #[tokio::test]
    async fn failed_start_keeps_locks_while_containers_exist() {
        let env = test_env();
        let (mut app, lifecycle) = init(&env, with_build_steps(&env)).await;
        app.start(&lifecycle).await.unwrap();

        env.fake.fail_on(ComposeAction::Up, 1);
        app.stop(&lifecycle, false).await.unwrap();
        assert!(app.start(&lifecycle).await.is_err());

        assert!(env.ctx.cache.has(&app.cache_keys.pre_lock).await);
        assert!(env.ctx.cache.has(&app.cache_keys.v4_pre_lock).await);
    }

    #[tokio::test]
    async fn operations_require_init() {
        let env = test_env();
        let lifecycle = Lifecycle::for_app(&env.demo_config(), env.ctx.clone());
        let mut app = env.app(env.demo_config());
        assert!(app.start(&lifecycle).await.is_err());
        assert_eq!(env.fake.invocations().len(), 0);
    }
}
