//! Default phase handlers
//!
//! | phase            | priority | handler                          |
//! |------------------|----------|----------------------------------|
//! | pre-init         | 4        | add-recipe                       |
//! | pre-init         | 5        | add-services                     |
//! | post-init        | 1        | add-hostnames                    |
//! | post-init        | 10       | set-info-env                     |
//! | post-init-engine | 5        | find-containers                  |
//! | post-init-engine | 6        | find-localhosts                  |
//! | ready            | 5        | set-compose-cache                |
//! | ready-engine     | 1        | ensure-network                   |
//! | pre-rebuild      | 5        | update-built-against, set-pullables |
//! | pre-start        | 5        | purge v3/v4 locks, update-built-against-pre |
//! | pre-start        | 100      | build-images                     |
//! | pre-start        | 110      | run-build-steps                  |
//! | post-start       | 1        | find-containers                  |
//! | post-start       | 2        | health-checks                    |
//! | post-start       | 3        | find-localhosts                  |
//! | post-start       | 5        | update-built-against-post        |
//! | post-start       | 100      | run-post-start-steps             |
//! | post-rebuild     | 5        | set-compose-cache                |
//! | post-stop        | 5        | reset-info                       |
//! | post-uninstall   | 5        | purge locks, compose and recipe caches |
//! | post-destroy     | 5        | purge-metadata-cache             |
//! | post-destroy     | 9999     | purge-compose-cache, purge-compose-dir |
//!
//! Each phase named in the app's `[events]` gets one more handler at 9999.

mod build;
mod events;
mod init;
mod purge;
mod status;

pub use events::EventHandler;

use crate::app::AppConfig;
use crate::cache::LockGeneration;
use crate::lifecycle::{handler_fn, Phase, Registration, DEFAULT_PRIORITY, RUN_LAST};
use futures_util::FutureExt;

macro_rules! hook {
    ($phase:expr, $priority:expr, $name:literal, $f:path) => {
        Registration::new(
            $phase,
            $priority,
            handler_fn($name, |app, ctx| $f(app, ctx).boxed()),
        )
    };
}

/// Registrations every app gets, followed by its event hooks
pub fn default_registry(config: &AppConfig) -> Vec<Registration> {
    let mut registry = vec![
        hook!(Phase::PreInit, 4, "add-recipe", init::add_recipe),
        hook!(Phase::PreInit, DEFAULT_PRIORITY, "add-services", init::add_services),
        hook!(Phase::PostInit, 1, "add-hostnames", init::add_hostnames),
        hook!(Phase::PostInit, 10, "set-info-env", init::set_info_env),
        hook!(Phase::PostInitEngine, DEFAULT_PRIORITY, "find-containers", status::find_containers),
        hook!(Phase::PostInitEngine, 6, "find-localhosts", status::find_localhosts),
        hook!(Phase::Ready, DEFAULT_PRIORITY, "set-compose-cache", init::set_compose_cache),
        hook!(Phase::ReadyEngine, 1, "ensure-network", init::ensure_network),
        hook!(Phase::PreRebuild, DEFAULT_PRIORITY, "update-built-against", build::update_built_against),
        hook!(Phase::PreRebuild, DEFAULT_PRIORITY, "set-pullables", init::set_pullables),
        Registration::new(
            Phase::PreStart,
            DEFAULT_PRIORITY,
            handler_fn("purge-v3-build-locks", |app, ctx| {
                build::purge_build_locks(app, ctx, LockGeneration::V3).boxed()
            }),
        ),
        Registration::new(
            Phase::PreStart,
            DEFAULT_PRIORITY,
            handler_fn("purge-v4-build-locks", |app, ctx| {
                build::purge_build_locks(app, ctx, LockGeneration::V4).boxed()
            }),
        ),
        hook!(Phase::PreStart, DEFAULT_PRIORITY, "update-built-against-pre", build::update_built_against_pre),
        hook!(Phase::PreStart, 100, "build-images", build::build_images),
        hook!(Phase::PreStart, 110, "run-build-steps", build::run_build_steps),
        hook!(Phase::PostStart, 1, "find-containers", status::find_containers),
        hook!(Phase::PostStart, 2, "health-checks", status::health_checks),
        hook!(Phase::PostStart, 3, "find-localhosts", status::find_localhosts),
        hook!(Phase::PostStart, DEFAULT_PRIORITY, "update-built-against-post", build::update_built_against_post),
        hook!(Phase::PostStart, 100, "run-post-start-steps", build::run_post_start_steps),
        hook!(Phase::PostRebuild, DEFAULT_PRIORITY, "set-compose-cache", init::set_compose_cache),
        hook!(Phase::PostStop, DEFAULT_PRIORITY, "reset-info", status::reset_info),
        Registration::new(
            Phase::PostUninstall,
            DEFAULT_PRIORITY,
            handler_fn("purge-v3-build-locks", |app, ctx| {
                build::purge_build_locks(app, ctx, LockGeneration::V3).boxed()
            }),
        ),
        Registration::new(
            Phase::PostUninstall,
            DEFAULT_PRIORITY,
            handler_fn("purge-v4-build-locks", |app, ctx| {
                build::purge_build_locks(app, ctx, LockGeneration::V4).boxed()
            }),
        ),
        hook!(Phase::PostUninstall, DEFAULT_PRIORITY, "purge-compose-cache", purge::purge_compose_cache),
        hook!(Phase::PostUninstall, DEFAULT_PRIORITY, "purge-recipe-cache", purge::purge_recipe_cache),
        hook!(Phase::PostDestroy, DEFAULT_PRIORITY, "purge-metadata-cache", purge::purge_metadata_cache),
        hook!(Phase::PostDestroy, RUN_LAST, "purge-compose-cache", purge::purge_compose_cache),
        hook!(Phase::PostDestroy, RUN_LAST, "purge-compose-dir", purge::purge_compose_dir),
    ];

    registry.extend(config.phase_events().into_iter().map(|(phase, commands)| {
        Registration::new(phase, RUN_LAST, EventHandler::shared(phase, commands))
    }));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::EventCommand;
    use crate::lifecycle::PhaseScheduler;
    use std::collections::BTreeMap;

    #[test]
    fn registry_covers_the_lifecycle() {
        let mut scheduler = PhaseScheduler::new();
        scheduler.extend(default_registry(&AppConfig::default()));

        assert_eq!(scheduler.handler_count(Phase::PreInit), 2);
        assert_eq!(scheduler.handler_count(Phase::PreStart), 5);
        assert_eq!(scheduler.handler_count(Phase::PostUninstall), 4);
        assert_eq!(scheduler.handler_count(Phase::PostDestroy), 3);
        assert_eq!(scheduler.handler_count(Phase::ReadyV4), 0);
    }

    #[test]
    fn events_run_last() {
        let config = AppConfig {
            events: BTreeMap::from([(
                "post-start".to_string(),
                vec![EventCommand::Plain("echo hi".to_string())],
            )]),
            ..Default::default()
        };
        let registry = default_registry(&config);
        let event = registry.last().unwrap();
        assert_eq!(event.phase, Phase::PostStart);
        assert_eq!(event.priority, RUN_LAST);
        assert_eq!(event.handler.name(), "events:post-start");
    }
}
