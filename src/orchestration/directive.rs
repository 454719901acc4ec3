//! Orchestration directives
//!
//! A directive is the unit of work the router accepts: which project (or
//! which single container), which services, and an option bag.

use crate::error::{BerthError, BerthResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Command carried by a `run` directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    /// A single string, split with shell-word rules before use
    Shell(String),
    /// A ready argv
    Argv(Vec<String>),
}

impl CommandSpec {
    /// Resolve to an argv
    pub fn to_argv(&self) -> BerthResult<Vec<String>> {
        match self {
            Self::Argv(argv) => Ok(argv.clone()),
            Self::Shell(line) => shlex::split(line).ok_or_else(|| {
                BerthError::InvalidDirective(format!("cannot parse command: {}", line))
            }),
        }
    }
}

impl From<&str> for CommandSpec {
    fn from(line: &str) -> Self {
        Self::Shell(line.to_string())
    }
}

impl From<Vec<String>> for CommandSpec {
    fn from(argv: Vec<String>) -> Self {
        Self::Argv(argv)
    }
}

/// Option bag of a directive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectiveOptions {
    pub detach: Option<bool>,
    pub user: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub workdir: Option<String>,
    pub no_tty: Option<bool>,
    /// Part of a pre-start build chain
    pub prestart: bool,
    /// Last step of a pre-start build chain
    pub last: bool,
    pub auto_remove: bool,
    /// Stop with kill instead of a graceful stop
    pub kill: bool,
    /// Destroy with `down` (networks, volumes) instead of `rm`
    pub purge: bool,
    pub follow: bool,
    pub timestamps: bool,
    /// Services whose images are pulled
    pub pullable: Vec<String>,
    /// Services whose images are built locally
    pub local: Vec<String>,
    pub no_cache: bool,
    pub ignore_return_code: bool,
    /// Attach the terminal to an exec
    pub interactive: bool,
}

/// One unit of orchestration work
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Directive {
    /// Route through the compose runtime
    pub compose: bool,
    /// Explicit container id or name
    pub id: Option<String>,
    pub project: String,
    pub compose_units: Vec<PathBuf>,
    pub services: Vec<String>,
    pub cmd: Option<CommandSpec>,
    pub opts: DirectiveOptions,
}

impl Directive {
    /// A compose directive for a whole project
    pub fn compose(project: impl Into<String>, compose_units: Vec<PathBuf>) -> Self {
        Self {
            compose: true,
            project: project.into(),
            compose_units,
            ..Default::default()
        }
    }

    /// A directive addressing a single container
    pub fn container(id: impl Into<String>) -> Self {
        Self {
            compose: false,
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services = services.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cmd(mut self, cmd: impl Into<CommandSpec>) -> Self {
        self.cmd = Some(cmd.into());
        self
    }

    /// Container this directive resolves to
    ///
    /// The explicit id wins; otherwise a directive narrowed to exactly one
    /// service resolves to the compose v2 name of its first container. The
    /// router prefers asking compose and only falls back to this name.
    pub fn container_id(&self) -> Option<String> {
        if let Some(id) = &self.id {
            return Some(id.clone());
        }
        match self.services.as_slice() {
            [service] if !self.project.is_empty() => {
                Some(format!("{}-{}-1", self.project, service))
            }
            _ => None,
        }
    }

    /// Check the directive is routable before any runtime call
    pub fn validate(&self) -> BerthResult<()> {
        if self.compose {
            if self.project.is_empty() {
                return Err(BerthError::InvalidDirective(
                    "compose directive has no project".to_string(),
                ));
            }
            if self.compose_units.is_empty() {
                return Err(BerthError::InvalidDirective(format!(
                    "compose directive for {} has no compose files",
                    self.project
                )));
            }
        } else if self.container_id().is_none() {
            return Err(BerthError::InvalidDirective(
                "directive does not resolve to a single container".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy without the options that only make sense for exec
    pub fn stripped(&self) -> Self {
        let mut copy = self.clone();
        copy.opts.detach = None;
        copy.opts.environment.clear();
        copy.opts.no_tty = None;
        copy.opts.user = None;
        copy.opts.workdir = None;
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units() -> Vec<PathBuf> {
        vec![PathBuf::from("/tmp/demo/services.json")]
    }

    #[test]
    fn compose_directive_requires_project_and_units() {
        assert!(Directive::compose("demo", units()).validate().is_ok());

        let err = Directive::compose("", units()).validate().unwrap_err();
        assert!(matches!(err, BerthError::InvalidDirective(_)));

        let err = Directive::compose("demo", vec![]).validate().unwrap_err();
        assert!(err.to_string().contains("no compose files"));
    }

    #[test]
    fn container_directive_must_resolve() {
        assert!(Directive::container("abc123").validate().is_ok());

        let unresolved = Directive {
            project: "demo".to_string(),
            services: vec!["web".to_string(), "db".to_string()],
            ..Default::default()
        };
        assert!(unresolved.validate().is_err());
    }

    #[test]
    fn single_service_resolves_container_name() {
        let directive = Directive::compose("demo", units()).with_services(["web"]);
        assert_eq!(directive.container_id().as_deref(), Some("demo-web-1"));
    }

    #[test]
    fn stripped_drops_exec_options_only() {
        let mut directive = Directive::compose("demo", units()).with_services(["web"]);
        directive.opts.detach = Some(true);
        directive.opts.user = Some("root".to_string());
        directive.opts.workdir = Some("/app".to_string());
        directive.opts.no_tty = Some(true);
        directive.opts.environment.insert("A".to_string(), "1".to_string());
        directive.opts.kill = true;
        directive.opts.auto_remove = true;

        let stripped = directive.stripped();
        assert_eq!(stripped.opts.detach, None);
        assert_eq!(stripped.opts.user, None);
        assert_eq!(stripped.opts.workdir, None);
        assert_eq!(stripped.opts.no_tty, None);
        assert!(stripped.opts.environment.is_empty());
        assert!(stripped.opts.kill);
        assert!(stripped.opts.auto_remove);
        assert_eq!(stripped.services, directive.services);
        assert_eq!(directive.opts.user.as_deref(), Some("root"));
    }

    #[test]
    fn shell_command_is_split() {
        let cmd = CommandSpec::from("echo 'hello world' && true");
        assert_eq!(
            cmd.to_argv().unwrap(),
            vec!["echo", "hello world", "&&", "true"]
        );
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        let err = CommandSpec::from("echo 'oops").to_argv().unwrap_err();
        assert!(matches!(err, BerthError::InvalidDirective(_)));
    }
}
