//! App lifecycle
//!
//! Phases, the priority scheduler that emits them, and the handlers berth
//! registers by default.

pub mod hooks;
mod phase;
mod scheduler;

pub use phase::{Phase, PhasePolicy};
pub use scheduler::{
    handler_fn, FnHandler, HandlerFuture, HandlerSource, PhaseHandler, PhaseReport, PhaseScheduler,
    Registration, DEFAULT_PRIORITY, RUN_LAST,
};

use crate::app::{App, AppConfig, BuilderRegistry};
use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::BerthResult;
use crate::orchestration::{ContainerRuntime, Router};
use std::sync::Arc;

/// Everything a handler may touch besides the app itself
#[derive(Clone)]
pub struct HookContext {
    pub config: Arc<Config>,
    pub cache: Arc<CacheStore>,
    pub router: Arc<Router>,
    pub builders: Arc<BuilderRegistry>,
    /// Tool version builds are recorded against
    pub version: String,
}

impl HookContext {
    pub fn new(
        config: Arc<Config>,
        cache: Arc<CacheStore>,
        router: Arc<Router>,
        builders: Arc<BuilderRegistry>,
    ) -> Self {
        let version = config.version();
        Self {
            config,
            cache,
            router,
            builders,
            version,
        }
    }

    pub fn engine(&self) -> &dyn ContainerRuntime {
        self.router.engine().as_ref()
    }
}

/// A scheduler bound to its context
pub struct Lifecycle {
    scheduler: PhaseScheduler,
    ctx: HookContext,
}

impl Lifecycle {
    pub fn new(scheduler: PhaseScheduler, ctx: HookContext) -> Self {
        Self { scheduler, ctx }
    }

    /// Lifecycle with the default handlers plus the app's own event hooks
    pub fn for_app(config: &AppConfig, ctx: HookContext) -> Self {
        let mut scheduler = PhaseScheduler::new();
        scheduler.extend(hooks::default_registry(config));
        Self::new(scheduler, ctx)
    }

    pub fn ctx(&self) -> &HookContext {
        &self.ctx
    }

    pub fn scheduler_mut(&mut self) -> &mut PhaseScheduler {
        &mut self.scheduler
    }

    /// Emit `phase`; tolerated handler failures become app messages
    pub async fn emit(&self, phase: Phase, app: &mut App) -> BerthResult<PhaseReport> {
        let report = self.scheduler.emit(phase, app, &self.ctx).await?;
        for (handler, error) in &report.failures {
            app.messages
                .push(format!("{} failed during {}: {}", handler, phase, error));
        }
        Ok(report)
    }
}
