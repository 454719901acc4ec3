//! Interactive vs plain output detection

use std::io::IsTerminal;

/// Environment variables whose presence means a CI runner
const CI_VARS: [&str; 8] = [
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
    "BUILDKITE",
    "TF_BUILD",
];

#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    interactive: bool,
}

impl UiContext {
    /// Interactive when stdout and stdin are terminals outside CI
    pub fn detect() -> Self {
        let interactive = std::io::stdout().is_terminal()
            && std::io::stdin().is_terminal()
            && !CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self { interactive }
    }

    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    /// Spinners and colors
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_context_is_plain() {
        assert!(!UiContext::non_interactive().use_fancy_output());
    }

    #[test]
    #[serial_test::serial]
    fn ci_runner_is_never_interactive() {
        let previous = std::env::var_os("CI");
        std::env::set_var("CI", "true");
        let ctx = UiContext::detect();
        match previous {
            Some(value) => std::env::set_var("CI", value),
            None => std::env::remove_var("CI"),
        }
        assert!(!ctx.use_fancy_output());
    }
}
