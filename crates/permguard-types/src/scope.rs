//! Scope hierarchy for permission declarations.
//!
//! # Scope Hierarchy
//!
//! ```text
//! Organization          (default token permissions)
//!   └── Repository      (repository override)
//!         └── Workflow  (top-level `permissions:`)
//!               └── Job (job-level `permissions:`)
//!                     └── Step (inherits only)
//! ```
//!
//! Scopes are totally ordered from widest to narrowest, so
//! `Scope::Organization < Scope::Step`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A level in the organization → step hierarchy.
///
/// # Example
///
/// ```
/// use permguard_types::Scope;
///
/// assert!(Scope::Job.is_narrower_than(Scope::Workflow));
/// assert!(!Scope::Repository.is_narrower_than(Scope::Workflow));
/// assert_eq!(Scope::Workflow.child(), Some(Scope::Job));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Organization,
    Repository,
    Workflow,
    Job,
    Step,
}

impl Scope {
    /// All scopes, widest first.
    pub const ALL: [Self; 5] = [
        Self::Organization,
        Self::Repository,
        Self::Workflow,
        Self::Job,
        Self::Step,
    ];

    /// Returns `true` if `self` sits strictly below `other`.
    #[must_use]
    pub fn is_narrower_than(self, other: Self) -> bool {
        self > other
    }

    /// The scope directly below this one.
    #[must_use]
    pub fn child(self) -> Option<Self> {
        match self {
            Self::Organization => Some(Self::Repository),
            Self::Repository => Some(Self::Workflow),
            Self::Workflow => Some(Self::Job),
            Self::Job => Some(Self::Step),
            Self::Step => None,
        }
    }

    /// Jobs and steps are where code actually runs with a token.
    #[must_use]
    pub fn is_leaf(self) -> bool {
        matches!(self, Self::Job | Self::Step)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Repository => "repository",
            Self::Workflow => "workflow",
            Self::Job => "job",
            Self::Step => "step",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location of a node in the hierarchy, e.g. `r1/release/publish`.
///
/// The first segment is the repository identifier. Paths compare
/// segment by segment, which keeps every node of a repository
/// contiguous when sorted.
///
/// # Example
///
/// ```
/// use permguard_types::ScopePath;
///
/// let job = ScopePath::repository("r1").join("release").join("publish");
/// assert_eq!(job.to_string(), "r1/release/publish");
/// assert_eq!(job.repository_id(), Some("r1"));
/// assert_eq!(job.depth(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct ScopePath(Vec<String>);

impl ScopePath {
    /// Path of a repository root node.
    #[must_use]
    pub fn repository(id: impl Into<String>) -> Self {
        Self(vec![id.into()])
    }

    /// Returns a new path with `segment` appended.
    #[must_use]
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Repository identifier (first segment).
    #[must_use]
    pub fn repository_id(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Last segment, i.e. the node's own name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Returns `true` if `self` is `ancestor` or lies below it.
    #[must_use]
    pub fn starts_with(&self, ancestor: &Self) -> bool {
        self.0.starts_with(&ancestor.0)
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl From<ScopePath> for String {
    fn from(path: ScopePath) -> Self {
        path.to_string()
    }
}

impl From<String> for ScopePath {
    fn from(s: String) -> Self {
        Self(
            s.split('/')
                .filter(|seg| !seg.is_empty())
                .map(String::from)
                .collect(),
        )
    }
}

impl From<&str> for ScopePath {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}
