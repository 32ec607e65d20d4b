//! Workflow trigger events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The event that starts a workflow (`on:`).
///
/// # Fork-originated triggers
///
/// `pull_request_target` and `workflow_run` run in the context of the base
/// repository, with its token, while processing contributions that may come
/// from a fork.
///
/// # Example
///
/// ```
/// use permguard_types::TriggerKind;
///
/// assert_eq!(TriggerKind::parse("pull_request_target"), TriggerKind::PullRequestTarget);
/// assert!(TriggerKind::PullRequestTarget.is_fork_originated());
/// assert!(!TriggerKind::Push.is_fork_originated());
/// assert_eq!(TriggerKind::parse("release"), TriggerKind::Other("release".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TriggerKind {
    Push,
    PullRequest,
    PullRequestTarget,
    WorkflowCall,
    WorkflowDispatch,
    WorkflowRun,
    Schedule,
    Other(String),
}

impl TriggerKind {
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "push" => Self::Push,
            "pull_request" => Self::PullRequest,
            "pull_request_target" => Self::PullRequestTarget,
            "workflow_call" => Self::WorkflowCall,
            "workflow_dispatch" => Self::WorkflowDispatch,
            "workflow_run" => Self::WorkflowRun,
            "schedule" => Self::Schedule,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Push => "push",
            Self::PullRequest => "pull_request",
            Self::PullRequestTarget => "pull_request_target",
            Self::WorkflowCall => "workflow_call",
            Self::WorkflowDispatch => "workflow_dispatch",
            Self::WorkflowRun => "workflow_run",
            Self::Schedule => "schedule",
            Self::Other(name) => name,
        }
    }

    /// Untrusted code may run with the base repository's token.
    #[must_use]
    pub fn is_fork_originated(&self) -> bool {
        matches!(self, Self::PullRequestTarget | Self::WorkflowRun)
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TriggerKind> for String {
    fn from(kind: TriggerKind) -> Self {
        kind.as_str().to_string()
    }
}

impl From<String> for TriggerKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}
