//! User-declared event commands

use crate::app::{App, EventCommand};
use crate::error::{BerthError, BerthResult};
use crate::lifecycle::{HookContext, Phase, PhaseHandler};
use crate::orchestration::Directive;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Runs one phase's `[events]` commands through the router
pub struct EventHandler {
    name: String,
    commands: Vec<EventCommand>,
}

impl EventHandler {
    pub fn new(phase: Phase, commands: Vec<EventCommand>) -> Self {
        Self {
            name: format!("events:{}", phase),
            commands,
        }
    }

    pub fn shared(phase: Phase, commands: Vec<EventCommand>) -> Arc<dyn PhaseHandler> {
        Arc::new(Self::new(phase, commands))
    }

    fn directives(&self, app: &App) -> BerthResult<Vec<Directive>> {
        let mut directives = Vec::new();
        for command in &self.commands {
            for (service, cmd) in command.resolve(app.primary_service()) {
                let service = service.ok_or_else(|| {
                    BerthError::InvalidDirective(format!(
                        "{} has no service to run {:?} in",
                        app.name, cmd
                    ))
                })?;
                let mut directive = app.service_directive(&service).with_cmd(cmd.as_str());
                directive.opts.interactive = true;
                directives.push(directive);
            }
        }
        Ok(directives)
    }
}

#[async_trait]
impl PhaseHandler for EventHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, app: &mut App, ctx: &HookContext) -> BerthResult<()> {
        let directives = self.directives(app)?;
        info!("Running {} event command(s) via {}", directives.len(), self.name);
        ctx.router.run(&directives).await?;
        Ok(())
    }
}
