//! Priority-ordered phase scheduler
//!
//! Handlers attach to a [`Phase`] with a priority. Emitting a phase runs its
//! handlers one at a time in ascending priority; equal priorities run in
//! registration order. Handlers take `&mut App`, so a lower priority always
//! finishes before a higher one starts.

use crate::app::App;
use crate::error::{BerthError, BerthResult};
use crate::lifecycle::phase::{Phase, PhasePolicy};
use crate::lifecycle::HookContext;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Priority handlers get when none is given
pub const DEFAULT_PRIORITY: i32 = 5;

/// Priority of catch-all sweeps that must see everything else done
pub const RUN_LAST: i32 = 9999;

/// Something that reacts to a phase
#[async_trait]
pub trait PhaseHandler: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    async fn handle(&self, app: &mut App, ctx: &HookContext) -> BerthResult<()>;
}

/// Future returned by function handlers
pub type HandlerFuture<'a> = BoxFuture<'a, BerthResult<()>>;

/// Adapter turning a function into a [`PhaseHandler`]
pub struct FnHandler<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F> PhaseHandler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut App, &'a HookContext) -> HandlerFuture<'a> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, app: &mut App, ctx: &HookContext) -> BerthResult<()> {
        (self.f)(app, ctx).await
    }
}

/// Wrap a function returning a boxed future as a handler
pub fn handler_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn PhaseHandler>
where
    F: for<'a> Fn(&'a mut App, &'a HookContext) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}

/// One `(phase, priority, handler)` entry
#[derive(Clone)]
pub struct Registration {
    pub phase: Phase,
    pub priority: i32,
    pub handler: Arc<dyn PhaseHandler>,
}

impl Registration {
    pub fn new(phase: Phase, priority: i32, handler: Arc<dyn PhaseHandler>) -> Self {
        Self {
            phase,
            priority,
            handler,
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("phase", &self.phase)
            .field("priority", &self.priority)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// Supplier of extra registrations (plugins)
pub trait HandlerSource {
    fn registrations(&self) -> Vec<Registration>;
}

/// Result of emitting a phase
#[derive(Debug, Default)]
pub struct PhaseReport {
    /// Handlers that completed successfully
    pub completed: usize,
    /// `(handler, error)` for handlers that failed under continue-on-error
    pub failures: Vec<(String, BerthError)>,
}

impl PhaseReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
pub struct PhaseScheduler {
    handlers: HashMap<Phase, Vec<(i32, Arc<dyn PhaseHandler>)>>,
    policies: HashMap<Phase, PhasePolicy>,
}

impl PhaseScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a handler to a phase
    pub fn register(&mut self, phase: Phase, priority: i32, handler: Arc<dyn PhaseHandler>) {
        let list = self.handlers.entry(phase).or_default();
        // Insert after every entry with priority <= ours to keep registration order
        let at = list.partition_point(|(p, _)| *p <= priority);
        list.insert(at, (priority, handler));
    }

    /// Attach a handler at [`DEFAULT_PRIORITY`]
    pub fn register_default(&mut self, phase: Phase, handler: Arc<dyn PhaseHandler>) {
        self.register(phase, DEFAULT_PRIORITY, handler);
    }

    pub fn extend<I: IntoIterator<Item = Registration>>(&mut self, registrations: I) {
        for r in registrations {
            self.register(r.phase, r.priority, r.handler);
        }
    }

    pub fn extend_from(&mut self, source: &dyn HandlerSource) {
        self.extend(source.registrations());
    }

    /// Override a phase's failure policy
    pub fn declare(&mut self, phase: Phase, policy: PhasePolicy) {
        self.policies.insert(phase, policy);
    }

    pub fn policy(&self, phase: Phase) -> PhasePolicy {
        self.policies
            .get(&phase)
            .copied()
            .unwrap_or_else(|| phase.default_policy())
    }

    pub fn handler_count(&self, phase: Phase) -> usize {
        self.handlers.get(&phase).map_or(0, Vec::len)
    }

    /// Run every handler of `phase` in priority order
    ///
    /// Under an abort policy the first failure is returned as
    /// [`BerthError::PhaseFailed`]; otherwise failures are logged and
    /// collected in the report.
    pub async fn emit(
        &self,
        phase: Phase,
        app: &mut App,
        ctx: &HookContext,
    ) -> BerthResult<PhaseReport> {
        let mut report = PhaseReport::default();
        let Some(handlers) = self.handlers.get(&phase) else {
            return Ok(report);
        };
        let policy = self.policy(phase);

        debug!("Emitting {} ({} handlers)", phase, handlers.len());
        for (priority, handler) in handlers {
            debug!("{} -> {} [{}]", phase, handler.name(), priority);
            match handler.handle(app, ctx).await {
                Ok(()) => report.completed += 1,
                Err(e) if policy.continue_on_error => {
                    warn!("{} failed during {}: {}", handler.name(), phase, e);
                    report.failures.push((handler.name().to_string(), e));
                }
                Err(e) => {
                    return Err(BerthError::PhaseFailed {
                        phase: phase.to_string(),
                        handler: handler.name().to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing::{test_app, test_context};
    use futures_util::FutureExt;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &str) -> Arc<dyn PhaseHandler> {
        let log = log.clone();
        let label = label.to_string();
        handler_fn(label.clone(), move |_app, _ctx| {
            let log = log.clone();
            let label = label.clone();
            async move {
                log.lock().unwrap().push(label);
                Ok(())
            }
            .boxed()
        })
    }

    fn failing(name: &str) -> Arc<dyn PhaseHandler> {
        handler_fn(name.to_string(), |_app, _ctx| {
            async { Err(BerthError::Internal("boom".to_string())) }.boxed()
        })
    }

    #[tokio::test]
    async fn runs_in_priority_order() {
        let (ctx, _temp) = test_context();
        let mut app = test_app(&ctx);
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = PhaseScheduler::new();

        scheduler.register(Phase::PostStart, RUN_LAST, recorder(&log, "last"));
        scheduler.register_default(Phase::PostStart, recorder(&log, "default"));
        scheduler.register(Phase::PostStart, 1, recorder(&log, "first"));
        scheduler.register_default(Phase::PostStart, recorder(&log, "default-2"));

        scheduler.emit(Phase::PostStart, &mut app, &ctx).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first", "default", "default-2", "last"]
        );
    }

    #[tokio::test]
    async fn handlers_see_earlier_mutations() {
        let (ctx, _temp) = test_context();
        let mut app = test_app(&ctx);
        let mut scheduler = PhaseScheduler::new();

        scheduler.register(
            Phase::PostInit,
            1,
            handler_fn("set", |app, _ctx| {
                async move {
                    app.messages.push("from-first".into());
                    Ok(())
                }
                .boxed()
            }),
        );
        scheduler.register(
            Phase::PostInit,
            10,
            handler_fn("check", |app, _ctx| {
                async move {
                    if app.messages.is_empty() {
                        return Err(BerthError::Internal("not yet".to_string()));
                    }
                    Ok(())
                }
                .boxed()
            }),
        );

        let report = scheduler.emit(Phase::PostInit, &mut app, &ctx).await.unwrap();
        assert_eq!(report.completed, 2);
    }

    #[tokio::test]
    async fn abort_policy_stops_at_first_failure() {
        let (ctx, _temp) = test_context();
        let mut app = test_app(&ctx);
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = PhaseScheduler::new();

        scheduler.register(Phase::PreStart, 1, failing("broken"));
        scheduler.register(Phase::PreStart, 2, recorder(&log, "after"));

        let err = scheduler.emit(Phase::PreStart, &mut app, &ctx).await.unwrap_err();
        match err {
            BerthError::PhaseFailed { phase, handler, .. } => {
                assert_eq!(phase, "pre-start");
                assert_eq!(handler, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn continue_policy_runs_everything() {
        let (ctx, _temp) = test_context();
        let mut app = test_app(&ctx);
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = PhaseScheduler::new();

        scheduler.register(Phase::PostStop, 1, failing("broken"));
        scheduler.register(Phase::PostStop, 2, recorder(&log, "after"));

        let report = scheduler.emit(Phase::PostStop, &mut app, &ctx).await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "broken");
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[tokio::test]
    async fn declared_policy_overrides_default() {
        let (ctx, _temp) = test_context();
        let mut app = test_app(&ctx);
        let mut scheduler = PhaseScheduler::new();
        scheduler.declare(
            Phase::PreStart,
            PhasePolicy {
                continue_on_error: true,
            },
        );
        scheduler.register_default(Phase::PreStart, failing("broken"));

        let report = scheduler.emit(Phase::PreStart, &mut app, &ctx).await.unwrap();
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn empty_phase_is_a_noop() {
        let (ctx, _temp) = test_context();
        let mut app = test_app(&ctx);
        let report = PhaseScheduler::new()
            .emit(Phase::Ready, &mut app, &ctx)
            .await
            .unwrap();
        assert_eq!(report.completed, 0);
    }

    struct Plugin;

    impl HandlerSource for Plugin {
        fn registrations(&self) -> Vec<Registration> {
            vec![Registration::new(
                Phase::Ready,
                DEFAULT_PRIORITY,
                handler_fn("plugin", |_app, _ctx| async { Ok(()) }.boxed()),
            )]
        }
    }

    #[test]
    fn handler_sources_extend_the_registry() {
        let mut scheduler = PhaseScheduler::new();
        scheduler.extend_from(&Plugin);
        assert_eq!(scheduler.handler_count(Phase::Ready), 1);
        assert_eq!(scheduler.handler_count(Phase::PreInit), 0);
    }
}
