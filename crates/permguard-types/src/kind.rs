//! Permission kinds and the kind registry.
//!
//! Hosting platforms add token scopes over time, so [`PermissionKind`] is an
//! open newtype rather than a closed enum. The [`KindRegistry`] records which
//! kinds are known and how risky an unused `write` grant on each one is.
//!
//! | Kind | Unused `write` risk |
//! |------|---------------------|
//! | `contents` | critical |
//! | `id-token` | critical |
//! | everything else | warning |

use crate::Severity;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// A category of token permission, e.g. `contents` or `id-token`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionKind(String);

impl PermissionKind {
    pub const ACTIONS: &'static str = "actions";
    pub const CONTENTS: &'static str = "contents";
    pub const ID_TOKEN: &'static str = "id-token";
    pub const PACKAGES: &'static str = "packages";
    pub const PULL_REQUESTS: &'static str = "pull-requests";

    /// Creates a kind. Names are trimmed and lowercased.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_ascii_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PermissionKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Borrow<str> for PermissionKind {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Registry metadata for one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindInfo {
    /// Severity of a `write` grant the job does not need.
    pub unused_write: Severity,
    pub description: String,
}

const BUILTIN_KINDS: &[(&str, Severity, &str)] = &[
    ("actions", Severity::Warning, "workflow runs and artifacts"),
    ("attestations", Severity::Warning, "artifact attestations"),
    ("checks", Severity::Warning, "check runs and suites"),
    ("contents", Severity::Critical, "repository contents, commits, releases"),
    ("deployments", Severity::Warning, "deployments and environments"),
    ("discussions", Severity::Warning, "discussions"),
    ("id-token", Severity::Critical, "OIDC token for cloud federation"),
    ("issues", Severity::Warning, "issues and comments"),
    ("models", Severity::Warning, "hosted model inference"),
    ("packages", Severity::Warning, "package registry"),
    ("pages", Severity::Warning, "pages builds"),
    ("pull-requests", Severity::Warning, "pull requests and reviews"),
    ("repository-projects", Severity::Warning, "classic projects"),
    ("security-events", Severity::Warning, "code scanning alerts"),
    ("statuses", Severity::Warning, "commit statuses"),
];

/// Known permission kinds with their risk metadata.
///
/// # Example
///
/// ```
/// use permguard_types::{KindRegistry, Severity};
///
/// let mut registry = KindRegistry::builtin();
/// assert!(registry.contains("id-token"));
/// assert_eq!(registry.unused_write_severity("id-token"), Severity::Critical);
///
/// registry.register("artifact-metadata", Severity::Warning, "new scope");
/// assert!(registry.contains("artifact-metadata"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindRegistry {
    kinds: BTreeMap<PermissionKind, KindInfo>,
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl KindRegistry {
    /// Registry pre-populated with the platform's token scopes.
    #[must_use]
    pub fn builtin() -> Self {
        let kinds = BUILTIN_KINDS
            .iter()
            .map(|(name, unused_write, description)| {
                (
                    PermissionKind::new(name),
                    KindInfo {
                        unused_write: *unused_write,
                        description: (*description).to_string(),
                    },
                )
            })
            .collect();
        Self { kinds }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Adds a kind, or replaces the metadata of an existing one.
    pub fn register(
        &mut self,
        kind: impl AsRef<str>,
        unused_write: Severity,
        description: impl Into<String>,
    ) {
        self.kinds.insert(
            PermissionKind::new(kind),
            KindInfo {
                unused_write,
                description: description.into(),
            },
        );
    }

    /// Changes the unused-write risk of a kind, registering it if needed.
    pub fn set_unused_write(&mut self, kind: impl AsRef<str>, severity: Severity) {
        self.kinds
            .entry(PermissionKind::new(kind))
            .and_modify(|info| info.unused_write = severity)
            .or_insert_with(|| KindInfo {
                unused_write: severity,
                description: String::new(),
            });
    }

    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&KindInfo> {
        self.kinds.get(kind)
    }

    /// Unregistered kinds default to `warning`.
    #[must_use]
    pub fn unused_write_severity(&self, kind: &str) -> Severity {
        self.get(kind).map_or(Severity::Warning, |info| info.unused_write)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &PermissionKind> {
        self.kinds.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PermissionKind, &KindInfo)> {
        self.kinds.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
