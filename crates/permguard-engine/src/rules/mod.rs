//! Policy rule catalogue.
//!
//! Each rule is an independent [`Rule`] over resolved privileges; the
//! [`RuleSet`] runs whichever rules are enabled and applies per-rule
//! severity overrides. Adding a rule means adding a module here and an
//! entry in [`ALL_RULES`], nothing else.

pub mod blanket_write;
pub mod explicit_declaration;
pub mod fork_trigger;
pub mod least_privilege;
pub mod parse_issues;
pub mod unpinned_action;

pub use blanket_write::BlanketWriteDefault;
pub use explicit_declaration::ExplicitDeclarationRequired;
pub use fork_trigger::ForkTriggerWriteToken;
pub use least_privilege::LeastPrivilegeExceeded;
pub use parse_issues::ParseIssues;
pub use unpinned_action::UnpinnedAction;

use crate::config::Config;
use crate::policy::Policy;
use crate::resolver::{Resolution, ResolvedPrivilege};
use permguard_types::{Finding, PermissionKind, Scope, ScopeNode, Severity};
use std::collections::BTreeMap;
use tracing::debug;

/// All rules: (name, description)
pub const ALL_RULES: &[(&str, &str)] = &[
    (
        explicit_declaration::NAME,
        "workflow jobs relying on the platform default token",
    ),
    (
        least_privilege::NAME,
        "write grants not required by the job's usage hint",
    ),
    (
        fork_trigger::NAME,
        "write token reachable from fork-originated triggers",
    ),
    (
        blanket_write::NAME,
        "blanket write-all, declared or implied by the fallback",
    ),
    (
        unpinned_action::NAME,
        "third-party actions pinned by mutable tag instead of commit SHA",
    ),
    (
        parse_issues::NAME,
        "malformed or unknown permission declarations",
    ),
];

/// One repository's tree and its resolution.
pub struct RepositoryCtx<'a> {
    pub repository: &'a ScopeNode,
    pub resolution: &'a Resolution,
    pub policy: &'a Policy,
}

impl<'a> RepositoryCtx<'a> {
    pub fn workflows(&self) -> impl Iterator<Item = WorkflowCtx<'a>> + '_ {
        self.repository
            .children
            .iter()
            .filter(|n| n.scope == Scope::Workflow)
            .map(|workflow| WorkflowCtx {
                repository: self.repository,
                workflow,
                resolution: self.resolution,
                policy: self.policy,
            })
    }
}

/// One workflow within a repository.
pub struct WorkflowCtx<'a> {
    pub repository: &'a ScopeNode,
    pub workflow: &'a ScopeNode,
    pub resolution: &'a Resolution,
    pub policy: &'a Policy,
}

impl<'a> WorkflowCtx<'a> {
    pub fn jobs(&self) -> impl Iterator<Item = &'a ScopeNode> {
        self.workflow
            .children
            .iter()
            .filter(|n| n.scope == Scope::Job)
    }

    /// Jobs paired with their resolved privilege.
    pub fn resolved_jobs(&self) -> impl Iterator<Item = (&'a ScopeNode, &'a ResolvedPrivilege)> + '_ {
        self.jobs()
            .filter_map(|job| self.resolution.get(&job.path).map(|r| (job, r)))
    }

    /// Write kinds of `resolved`, highest unused-write risk first, then by
    /// name.
    #[must_use]
    pub fn write_kinds_by_risk(&self, resolved: &ResolvedPrivilege) -> Vec<PermissionKind> {
        let mut kinds: Vec<PermissionKind> = resolved.write_kinds().cloned().collect();
        kinds.sort_by(|a, b| {
            self.policy
                .unused_write_severity(b.as_str())
                .cmp(&self.policy.unused_write_severity(a.as_str()))
                .then_with(|| a.cmp(b))
        });
        kinds
    }
}

/// A policy rule.
///
/// Rules never fail: missing optional metadata degrades to a
/// lower-severity finding.
pub trait Rule: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Checks repository-level state, once per repository.
    fn check_repository(&self, _ctx: &RepositoryCtx<'_>) -> Vec<Finding> {
        Vec::new()
    }

    /// Checks one workflow.
    fn check_workflow(&self, _ctx: &WorkflowCtx<'_>) -> Vec<Finding> {
        Vec::new()
    }
}

/// The enabled rules plus their severity overrides.
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
    severity_overrides: BTreeMap<String, Severity>,
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("rules", &self.names())
            .field("severity_overrides", &self.severity_overrides)
            .finish()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::from_config(&Config::default(), None)
    }
}

impl RuleSet {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            severity_overrides: BTreeMap::new(),
        }
    }

    /// Builds the catalogue from `[rules.*]` config. `filter` restricts the
    /// run to a single rule.
    #[must_use]
    pub fn from_config(config: &Config, filter: Option<&str>) -> Self {
        let trusted_owners = config
            .rules
            .get(unpinned_action::NAME)
            .and_then(|c| c.get_string_list("trusted_owners"));

        let candidates: Vec<Box<dyn Rule>> = vec![
            Box::new(ExplicitDeclarationRequired),
            Box::new(LeastPrivilegeExceeded),
            Box::new(ForkTriggerWriteToken),
            Box::new(BlanketWriteDefault),
            Box::new(match trusted_owners {
                Some(owners) => UnpinnedAction::with_trusted_owners(owners),
                None => UnpinnedAction::default(),
            }),
            Box::new(ParseIssues),
        ];

        let mut set = Self::empty();
        for rule in candidates {
            let name = rule.name().to_string();
            if filter.is_some_and(|f| f != name) || !config.is_rule_enabled(&name) {
                debug!(rule = %name, "Rule disabled");
                continue;
            }
            set.rules.push(rule);
        }
        for name in config.rules.keys() {
            if let Some(severity) = config.rule_severity(name) {
                set.severity_overrides.insert(name.clone(), severity);
            }
        }
        set
    }

    #[must_use]
    pub fn with_rule(mut self, rule: Box<dyn Rule>) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn with_severity(mut self, rule: impl Into<String>, severity: Severity) -> Self {
        self.severity_overrides.insert(rule.into(), severity);
        self
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Runs every rule over one repository. Findings are unsorted.
    #[must_use]
    pub fn evaluate(&self, ctx: &RepositoryCtx<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for rule in &self.rules {
            let mut produced = rule.check_repository(ctx);
            for workflow in ctx.workflows() {
                produced.extend(rule.check_workflow(&workflow));
            }
            debug!(
                rule = rule.name(),
                repository = %ctx.repository.path,
                findings = produced.len(),
                "Rule evaluated"
            );
            self.apply_severity(rule.name(), &mut produced);
            findings.extend(produced);
        }
        findings
    }

    // Keyed by finding name first, then by the producing rule.
    fn apply_severity(&self, rule: &str, findings: &mut [Finding]) {
        if self.severity_overrides.is_empty() {
            return;
        }
        for finding in findings.iter_mut() {
            if let Some(severity) = self
                .severity_overrides
                .get(&finding.rule)
                .or_else(|| self.severity_overrides.get(rule))
            {
                finding.severity = *severity;
            }
        }
    }
}
