//! Orchestration router
//!
//! Stateless operations over [`Directive`]s. Batch operations process every
//! directive independently and report per-item results; `run` is sequential
//! and stops at the first failure.

use crate::error::{BerthError, BerthResult};
use crate::orchestration::compose::{detect_detached_exec, ComposeAction, ComposeInvocation, OutputMode};
use crate::orchestration::directive::Directive;
use crate::orchestration::runtime::{CommandOutput, ComposeRuntime, ContainerRuntime, ListOptions};
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::{debug, info};

/// Environment merged into every `run` exec
pub fn default_cli_env(host_os: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("BERTH".to_string(), "ON".to_string()),
        ("BERTH_HOST_OS".to_string(), host_os.to_string()),
    ])
}

/// Per-directive results of a batch operation
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub results: Vec<BerthResult<T>>,
}

impl<T> BatchOutcome<T> {
    /// Collapse into one result
    ///
    /// A single failing directive yields its own error; several yield
    /// [`BerthError::PartialFailure`].
    pub fn into_result(self) -> BerthResult<Vec<T>> {
        let total = self.results.len();
        let mut values = Vec::with_capacity(total);
        let mut errors = Vec::new();
        for result in self.results {
            match result {
                Ok(value) => values.push(value),
                Err(e) => errors.push(e),
            }
        }

        match errors.len() {
            0 => Ok(values),
            1 if total == 1 => Err(errors.remove(0)),
            _ => Err(BerthError::PartialFailure { total, errors }),
        }
    }
}

/// Routes directives to the compose runtime or the engine
pub struct Router {
    compose: Arc<dyn ComposeRuntime>,
    engine: Arc<dyn ContainerRuntime>,
    cli_env: BTreeMap<String, String>,
    stdin_tty: bool,
}

impl Router {
    pub fn new(compose: Arc<dyn ComposeRuntime>, engine: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            compose,
            engine,
            cli_env: BTreeMap::new(),
            stdin_tty: std::io::stdin().is_terminal(),
        }
    }

    pub fn with_cli_env(mut self, cli_env: BTreeMap<String, String>) -> Self {
        self.cli_env = cli_env;
        self
    }

    /// Override terminal detection for exec `-T`
    pub fn with_stdin_tty(mut self, stdin_tty: bool) -> Self {
        self.stdin_tty = stdin_tty;
        self
    }

    pub fn engine(&self) -> &Arc<dyn ContainerRuntime> {
        &self.engine
    }

    /// Invocation for `action` carrying the directive's relevant options
    fn invocation(&self, action: ComposeAction, directive: &Directive) -> ComposeInvocation {
        let mut inv = ComposeInvocation::new(
            action,
            directive.project.clone(),
            directive.compose_units.clone(),
        )
        .with_services(directive.services.clone());
        inv.ignore_return_code = directive.opts.ignore_return_code;

        let opts = &directive.opts;
        match action {
            ComposeAction::Up => {
                if let Some(detach) = opts.detach {
                    inv.flags.detach = detach;
                }
            }
            ComposeAction::Exec => {
                if let Some(detach) = opts.detach {
                    inv.flags.detach = detach;
                }
                inv.flags.no_tty = opts.no_tty.unwrap_or(!self.stdin_tty);
                inv.flags.environment = opts.environment.clone();
                inv.flags.user = opts.user.clone();
                inv.flags.workdir = opts.workdir.clone();
            }
            ComposeAction::Logs => {
                inv.flags.follow = opts.follow;
                inv.flags.timestamps = opts.timestamps;
                inv.mode = OutputMode::Stream;
            }
            ComposeAction::Build => inv.flags.no_cache = opts.no_cache,
            ComposeAction::Down => inv.services.clear(),
            _ => {}
        }
        inv
    }

    /// `ps` with no services; the stand-in for "nothing to do"
    fn noop(&self, directive: &Directive) -> ComposeInvocation {
        ComposeInvocation::new(
            ComposeAction::Ps,
            directive.project.clone(),
            directive.compose_units.clone(),
        )
    }

    fn resolved_id(directive: &Directive) -> BerthResult<String> {
        directive.container_id().ok_or_else(|| {
            BerthError::InvalidDirective("directive does not resolve to a single container".to_string())
        })
    }

    /// Pull pullable services, then build local ones
    pub async fn build(&self, directives: &[Directive]) -> BatchOutcome<()> {
        let mut results = Vec::with_capacity(directives.len());
        for directive in directives {
            results.push(self.build_one(directive).await);
        }
        BatchOutcome { results }
    }

    async fn build_one(&self, directive: &Directive) -> BerthResult<()> {
        directive.validate()?;
        if !directive.compose {
            return Ok(());
        }

        let requested = |service: &&String| {
            directive.services.is_empty() || directive.services.contains(*service)
        };
        let pull: Vec<String> = directive.opts.pullable.iter().filter(requested).cloned().collect();
        let local: Vec<String> = directive.opts.local.iter().filter(requested).cloned().collect();

        let pull_inv = if pull.is_empty() {
            self.noop(directive)
        } else {
            self.invocation(ComposeAction::Pull, directive).with_services(pull)
        };
        self.compose.compose(&pull_inv).await?;

        let build_inv = if local.is_empty() {
            self.noop(directive)
        } else {
            let mut inv = self.invocation(ComposeAction::Build, directive).with_services(local);
            // Base images of pullable services were fetched above
            inv.flags.pull = false;
            inv
        };
        self.compose.compose(&build_inv).await?;
        Ok(())
    }

    /// Bring services up; idempotent
    pub async fn start(&self, directives: &[Directive]) -> BatchOutcome<()> {
        let mut results = Vec::with_capacity(directives.len());
        for directive in directives {
            results.push(self.start_one(directive).await);
        }
        BatchOutcome { results }
    }

    async fn start_one(&self, directive: &Directive) -> BerthResult<()> {
        directive.validate()?;
        if !directive.compose {
            return Err(BerthError::InvalidDirective(
                "start requires a compose directive".to_string(),
            ));
        }
        self.compose
            .compose(&self.invocation(ComposeAction::Up, directive))
            .await?;
        Ok(())
    }

    /// Stop services, killing them when the directive asks to
    pub async fn stop(&self, directives: &[Directive]) -> BatchOutcome<()> {
        let mut results = Vec::with_capacity(directives.len());
        for directive in directives {
            results.push(self.stop_one(directive).await);
        }
        BatchOutcome { results }
    }

    async fn stop_one(&self, directive: &Directive) -> BerthResult<()> {
        directive.validate()?;
        if directive.compose {
            let action = if directive.opts.kill {
                ComposeAction::Kill
            } else {
                ComposeAction::Stop
            };
            self.compose
                .compose(&self.invocation(action, directive))
                .await?;
            Ok(())
        } else {
            self.engine.stop(&Self::resolved_id(directive)?).await
        }
    }

    /// Remove containers (`down` when purging); absent containers are fine
    pub async fn destroy(&self, directives: &[Directive]) -> BatchOutcome<()> {
        let mut results = Vec::with_capacity(directives.len());
        for directive in directives {
            results.push(self.destroy_one(directive).await);
        }
        BatchOutcome { results }
    }

    async fn destroy_one(&self, directive: &Directive) -> BerthResult<()> {
        directive.validate()?;
        if directive.compose {
            let action = if directive.opts.purge {
                ComposeAction::Down
            } else {
                ComposeAction::Rm
            };
            self.compose
                .compose(&self.invocation(action, directive))
                .await?;
            Ok(())
        } else {
            self.engine
                .remove(&Self::resolved_id(directive)?, true, true)
                .await
        }
    }

    /// Stream service logs
    pub async fn logs(&self, directives: &[Directive]) -> BatchOutcome<CommandOutput> {
        let mut results = Vec::with_capacity(directives.len());
        for directive in directives {
            results.push(self.logs_one(directive).await);
        }
        BatchOutcome { results }
    }

    async fn logs_one(&self, directive: &Directive) -> BerthResult<CommandOutput> {
        directive.validate()?;
        if !directive.compose {
            return Err(BerthError::InvalidDirective(
                "logs requires a compose directive".to_string(),
            ));
        }
        self.compose
            .compose(&self.invocation(ComposeAction::Logs, directive))
            .await
    }

    /// Whether the directive's container exists
    pub async fn exists(&self, directive: &Directive) -> BerthResult<bool> {
        directive.validate()?;
        if directive.compose {
            let ids = self.compose_ids(directive).await?;
            Ok(!ids.is_empty())
        } else {
            let id = Self::resolved_id(directive)?;
            let containers = self.engine.list(&ListOptions::default()).await?;
            Ok(containers.iter().any(|c| c.id == id || c.name == id))
        }
    }

    /// Inspection data of the directive's container, if one exists
    ///
    /// For compose directives the first id `ps` reports is used.
    pub async fn scan(&self, directive: &Directive) -> BerthResult<Option<serde_json::Value>> {
        directive.validate()?;
        if directive.compose {
            let ids = self.compose_ids(directive).await?;
            if ids.len() > 1 {
                debug!(
                    "{} containers match {:?} in {}; scanning the first",
                    ids.len(),
                    directive.services,
                    directive.project
                );
            }
            match ids.first() {
                Some(id) => self.engine.inspect(id).await.map(Some),
                None => Ok(None),
            }
        } else {
            self.engine
                .inspect(&Self::resolved_id(directive)?)
                .await
                .map(Some)
        }
    }

    /// Container a single-service compose directive currently runs in
    ///
    /// Asks compose first, since container naming differs between compose
    /// versions; the synthesized name is the fallback.
    async fn resolve_container(&self, directive: &Directive) -> BerthResult<String> {
        if directive.compose && directive.services.len() == 1 {
            if let Some(id) = self.compose_ids(directive).await?.into_iter().next() {
                return Ok(id);
            }
        }
        Self::resolved_id(directive)
    }

    async fn compose_ids(&self, directive: &Directive) -> BerthResult<Vec<String>> {
        let output = self
            .compose
            .compose(&self.invocation(ComposeAction::Ps, directive))
            .await?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Execute commands in service containers, preserving ambient state
    ///
    /// A container that was not running beforehand is started for the
    /// command and stopped (and optionally removed) afterwards. Pre-start
    /// chains keep the container up between steps and stop it after the
    /// step marked `last`.
    pub async fn run(&self, directives: &[Directive]) -> BerthResult<Vec<CommandOutput>> {
        for directive in directives {
            directive.validate()?;
            if !directive.compose {
                return Err(BerthError::InvalidDirective(
                    "run requires a compose directive".to_string(),
                ));
            }
            if directive.cmd.is_none() {
                return Err(BerthError::InvalidDirective(
                    "run directive has no command".to_string(),
                ));
            }
        }

        let mut outputs = Vec::with_capacity(directives.len());
        for directive in directives {
            outputs.push(self.run_one(directive.clone()).await?);
        }
        Ok(outputs)
    }

    async fn run_one(&self, mut directive: Directive) -> BerthResult<CommandOutput> {
        for (key, value) in &self.cli_env {
            directive
                .opts
                .environment
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        directive.opts.kill = true;

        let cmd = match &directive.cmd {
            Some(spec) => spec.to_argv()?,
            None => Vec::new(),
        };
        let id = self.resolve_container(&directive).await?;

        let mut started = self.engine.is_running(&id).await?;
        if !started {
            info!("Starting {} to run a command", id);
            self.start_one(&directive.stripped()).await?;
            started = directive.opts.prestart && !directive.opts.last;
        }

        let output = self.exec(&directive, cmd).await?;

        if directive.opts.prestart && directive.opts.last {
            directive.services.clear();
        }
        if !started || directive.opts.last {
            self.stop_one(&directive.stripped()).await?;
        }
        if !started && directive.opts.auto_remove {
            self.destroy_one(&directive.stripped()).await?;
        }
        Ok(output)
    }

    async fn exec(&self, directive: &Directive, mut cmd: Vec<String>) -> BerthResult<CommandOutput> {
        let service = directive.services.first().cloned().ok_or_else(|| {
            BerthError::InvalidDirective("run directive names no service".to_string())
        })?;

        let mut inv = self
            .invocation(ComposeAction::Exec, directive)
            .with_services(vec![service]);
        if directive.opts.detach != Some(true) && detect_detached_exec(&mut cmd) {
            inv.flags.detach = true;
        }
        if directive.opts.interactive {
            inv.mode = OutputMode::Inherit;
        }
        inv.cmd = cmd;
        self.compose.compose(&inv).await
    }
}
