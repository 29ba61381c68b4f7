//! Terminal detection for status output
//!
//! Response bodies go to stdout, so spinners, progress bars and prompts are
//! drawn on stderr. Fancy output is used only when stderr and stdin are both
//! terminals and no CI service is detected; `cache clear --yes` sets
//! `auto_yes` to skip the confirmation prompt.

use std::io::IsTerminal;

/// Environment variables set by common CI services
const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
    "BUILDKITE",
    "TEAMCITY_VERSION",
    "TF_BUILD",
];

/// How status output is rendered
#[derive(Debug, Clone)]
pub struct UiContext {
    interactive: bool,
    /// Skip confirmation prompts
    auto_yes: bool,
}

impl UiContext {
    /// Inspect stderr, stdin and the environment
    pub fn detect() -> Self {
        let terminals = std::io::stderr().is_terminal() && std::io::stdin().is_terminal();
        Self {
            interactive: terminals && !running_in_ci(|var| std::env::var_os(var).is_some()),
            auto_yes: false,
        }
    }

    /// Plain line output, no prompts
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            auto_yes: false,
        }
    }

    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }

    /// Whether spinners and progress bars are drawn
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}

fn running_in_ci(is_set: impl Fn(&str) -> bool) -> bool {
    CI_VARS.iter().any(|var| is_set(var))
}
