//! Effective privilege resolution.
//!
//! One top-down pass per repository tree. A declared set replaces the
//! inherited set for every kind, so a job-level block completely
//! supersedes the workflow-level one. Nodes with no declaration anywhere
//! in their chain get the fallback computed from the workflow's triggers.
//! An undeclared repository node gets the join over all of its workflows'
//! fallbacks, so levels never widen going down an undeclared chain.

use crate::policy::Policy;
use permguard_types::{Level, PermissionKind, PermissionSet, Scope, ScopeNode, ScopePath, TriggerKind};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::trace;

/// Where a kind's effective level came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Provenance {
    /// A `permissions:` block (or repository override) at `path`.
    Declared { path: ScopePath, scope: Scope },
    OrganizationDefault,
    /// The platform's implicit token for `trigger`.
    PlatformFallback { trigger: TriggerKind },
}

impl Provenance {
    #[must_use]
    pub fn is_declared(&self) -> bool {
        matches!(self, Self::Declared { .. })
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared { path, scope } => write!(f, "declared at {scope} {path}"),
            Self::OrganizationDefault => f.write_str("organization default"),
            Self::PlatformFallback { trigger } => write!(f, "platform fallback for {trigger}"),
        }
    }
}

/// Effective permissions at one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPrivilege {
    pub path: ScopePath,
    pub scope: Scope,
    pub effective: BTreeMap<PermissionKind, Level>,
    pub provenance: BTreeMap<PermissionKind, Provenance>,
    /// Nearest node in the chain with a declaration, if any.
    pub declared_by: Option<ScopePath>,
}

impl ResolvedPrivilege {
    #[must_use]
    pub fn level(&self, kind: &PermissionKind) -> Level {
        self.effective.get(kind).copied().unwrap_or_default()
    }

    pub fn write_kinds(&self) -> impl Iterator<Item = &PermissionKind> {
        self.effective
            .iter()
            .filter(|(_, level)| level.is_write())
            .map(|(kind, _)| kind)
    }

    #[must_use]
    pub fn grants_write(&self) -> bool {
        self.write_kinds().next().is_some()
    }

    /// `true` when some node in the chain declared permissions.
    #[must_use]
    pub fn is_explicit(&self) -> bool {
        self.declared_by.is_some()
    }

    #[must_use]
    pub fn provenance_of(&self, kind: &PermissionKind) -> Option<&Provenance> {
        self.provenance.get(kind)
    }
}

/// Resolved privileges of every node of one or more trees, keyed by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    nodes: BTreeMap<ScopePath, ResolvedPrivilege>,
}

impl Resolution {
    #[must_use]
    pub fn get(&self, path: &ScopePath) -> Option<&ResolvedPrivilege> {
        self.nodes.get(path)
    }

    /// Job and step entries, in path order.
    pub fn leaves(&self) -> impl Iterator<Item = &ResolvedPrivilege> {
        self.nodes.values().filter(|r| r.scope.is_leaf())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedPrivilege> {
        self.nodes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn extend(&mut self, other: Resolution) {
        self.nodes.extend(other.nodes);
    }
}

#[derive(Clone)]
struct Inherited<'t> {
    set: &'t PermissionSet,
    path: &'t ScopePath,
    scope: Scope,
}

pub struct Resolver<'p> {
    policy: &'p Policy,
}

impl<'p> Resolver<'p> {
    #[must_use]
    pub fn new(policy: &'p Policy) -> Self {
        Self { policy }
    }

    /// Resolves every node of `tree`.
    #[must_use]
    pub fn resolve(&self, tree: &ScopeNode) -> Resolution {
        let mut resolution = Resolution::default();
        self.visit(tree, None, &[], &mut resolution);
        resolution
    }

    fn visit<'t>(
        &self,
        node: &'t ScopeNode,
        inherited: Option<Inherited<'t>>,
        triggers: &'t [TriggerKind],
        out: &mut Resolution,
    ) {
        let triggers = if node.scope == Scope::Workflow {
            node.triggers.as_slice()
        } else {
            triggers
        };
        let current = match node.declared {
            Some(ref set) => Some(Inherited {
                set,
                path: &node.path,
                scope: node.scope,
            }),
            None => inherited,
        };

        let resolved = match (current.as_ref(), node.scope) {
            (Some(decl), _) => self.declared(node, decl),
            (None, Scope::Repository) => self.repository_fallback(node),
            (None, _) => self.fallback(node, triggers),
        };
        trace!(path = %node.path, explicit = resolved.is_explicit(), "Resolved node");
        out.nodes.insert(node.path.clone(), resolved);

        for child in &node.children {
            self.visit(child, current.clone(), triggers, out);
        }
    }

    fn declared(&self, node: &ScopeNode, decl: &Inherited<'_>) -> ResolvedPrivilege {
        let effective = decl.set.expand(&self.policy.registry);
        let provenance = effective
            .keys()
            .map(|kind| {
                (
                    kind.clone(),
                    Provenance::Declared {
                        path: decl.path.clone(),
                        scope: decl.scope,
                    },
                )
            })
            .collect();
        ResolvedPrivilege {
            path: node.path.clone(),
            scope: node.scope,
            effective,
            provenance,
            declared_by: Some(decl.path.clone()),
        }
    }

    /// Per-kind join over the triggers' fallback sets. Triggers without a
    /// configured fallback, and every trigger when fallback assumptions are
    /// off, contribute the organization default.
    fn fallback(&self, node: &ScopeNode, triggers: &[TriggerKind]) -> ResolvedPrivilege {
        let sources: Vec<_> = if triggers.is_empty() {
            vec![self.default_source()]
        } else {
            triggers.iter().map(|t| self.trigger_source(t)).collect()
        };
        self.join(node, &sources)
    }

    /// Join over every workflow's fallback sources. The organization
    /// default takes part when some workflow (or the repository itself)
    /// has no triggers.
    fn repository_fallback(&self, node: &ScopeNode) -> ResolvedPrivilege {
        let workflows: Vec<&ScopeNode> = node
            .children
            .iter()
            .filter(|c| c.scope == Scope::Workflow)
            .collect();
        let triggers: BTreeSet<&TriggerKind> =
            workflows.iter().flat_map(|w| w.triggers.iter()).collect();

        let mut sources = Vec::new();
        if workflows.is_empty() || workflows.iter().any(|w| w.triggers.is_empty()) {
            sources.push(self.default_source());
        }
        sources.extend(triggers.into_iter().map(|t| self.trigger_source(t)));
        self.join(node, &sources)
    }

    fn default_source(&self) -> (&'p PermissionSet, Provenance) {
        (&self.policy.org_default, Provenance::OrganizationDefault)
    }

    fn trigger_source(&self, trigger: &TriggerKind) -> (&'p PermissionSet, Provenance) {
        let policy = self.policy;
        match policy.fallback.get(trigger) {
            Some(set) if policy.assume_platform_fallback => (
                set,
                Provenance::PlatformFallback {
                    trigger: trigger.clone(),
                },
            ),
            _ => self.default_source(),
        }
    }

    // Ties keep the first source's provenance.
    fn join(&self, node: &ScopeNode, sources: &[(&PermissionSet, Provenance)]) -> ResolvedPrivilege {
        let mut effective = BTreeMap::new();
        let mut provenance = BTreeMap::new();
        for (set, source) in sources {
            for (kind, level) in set.expand(&self.policy.registry) {
                let slot = effective.entry(kind.clone()).or_insert(Level::None);
                if level > *slot || !provenance.contains_key(&kind) {
                    *slot = (*slot).max(level);
                    provenance.insert(kind, source.clone());
                }
            }
        }

        ResolvedPrivilege {
            path: node.path.clone(),
            scope: node.scope,
            effective,
            provenance,
            declared_by: None,
        }
    }
}
