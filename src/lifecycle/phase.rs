//! Lifecycle phases and their failure policies

use crate::error::BerthError;
use std::fmt;
use std::str::FromStr;

/// A named point in an app's life that handlers attach to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    PreInit,
    PostInit,
    PostInitEngine,
    Ready,
    ReadyEngine,
    ReadyV4,
    PreRebuild,
    PostRebuild,
    PreStart,
    PostStart,
    PreStop,
    PostStop,
    PreUninstall,
    PostUninstall,
    PreDestroy,
    PostDestroy,
}

impl Phase {
    pub const ALL: [Phase; 16] = [
        Phase::PreInit,
        Phase::PostInit,
        Phase::PostInitEngine,
        Phase::Ready,
        Phase::ReadyEngine,
        Phase::ReadyV4,
        Phase::PreRebuild,
        Phase::PostRebuild,
        Phase::PreStart,
        Phase::PostStart,
        Phase::PreStop,
        Phase::PostStop,
        Phase::PreUninstall,
        Phase::PostUninstall,
        Phase::PreDestroy,
        Phase::PostDestroy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PreInit => "pre-init",
            Phase::PostInit => "post-init",
            Phase::PostInitEngine => "post-init-engine",
            Phase::Ready => "ready",
            Phase::ReadyEngine => "ready-engine",
            Phase::ReadyV4 => "ready-v4",
            Phase::PreRebuild => "pre-rebuild",
            Phase::PostRebuild => "post-rebuild",
            Phase::PreStart => "pre-start",
            Phase::PostStart => "post-start",
            Phase::PreStop => "pre-stop",
            Phase::PostStop => "post-stop",
            Phase::PreUninstall => "pre-uninstall",
            Phase::PostUninstall => "post-uninstall",
            Phase::PreDestroy => "pre-destroy",
            Phase::PostDestroy => "post-destroy",
        }
    }

    /// Failure policy a phase starts with
    pub fn default_policy(&self) -> PhasePolicy {
        let continue_on_error = matches!(
            self,
            Phase::PostStart
                | Phase::PostStop
                | Phase::PostRebuild
                | Phase::PostUninstall
                | Phase::PostDestroy
        );
        PhasePolicy { continue_on_error }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = BerthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| BerthError::UnknownPhase(s.to_string()))
    }
}

/// How a phase reacts to a failing handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhasePolicy {
    /// Run the remaining handlers and report failures instead of aborting
    pub continue_on_error: bool,
}
