//! Scope tree nodes.

use crate::{ActionRef, ParseIssue, PermissionSet, Scope, ScopePath, TriggerKind};

/// A node in one repository's scope tree.
///
/// Trees are built by the parser for a single analysis run and are not
/// mutated afterwards. `declared == None` means the node inherits.
///
/// # Example
///
/// ```
/// use permguard_types::{PermissionSet, Scope, ScopeNode, ScopePath};
///
/// let repo = ScopePath::repository("r1");
/// let workflow = ScopeNode::new(Scope::Workflow, repo.join("ci"))
///     .with_declared(PermissionSet::ReadAll)
///     .with_child(ScopeNode::new(Scope::Job, repo.join("ci").join("build")));
/// let tree = ScopeNode::new(Scope::Repository, repo).with_child(workflow);
///
/// assert_eq!(tree.walk().count(), 3);
/// assert_eq!(tree.declaration_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeNode {
    pub name: String,
    pub scope: Scope,
    pub path: ScopePath,
    pub declared: Option<PermissionSet>,
    /// Only populated on workflow nodes.
    pub triggers: Vec<TriggerKind>,
    /// Action reference of a step, or reusable workflow of a job.
    pub uses: Option<ActionRef>,
    pub display_name: Option<String>,
    /// Source file of a workflow node.
    pub source: Option<String>,
    pub issues: Vec<ParseIssue>,
    pub children: Vec<ScopeNode>,
}

impl ScopeNode {
    #[must_use]
    pub fn new(scope: Scope, path: ScopePath) -> Self {
        Self {
            name: path.name().unwrap_or_default().to_string(),
            scope,
            path,
            declared: None,
            triggers: Vec::new(),
            uses: None,
            display_name: None,
            source: None,
            issues: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_declared(mut self, set: PermissionSet) -> Self {
        self.declared = Some(set);
        self
    }

    #[must_use]
    pub fn with_triggers(mut self, triggers: impl IntoIterator<Item = TriggerKind>) -> Self {
        self.triggers = triggers.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_uses(mut self, uses: ActionRef) -> Self {
        self.uses = Some(uses);
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: ScopeNode) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn child(&self, name: &str) -> Option<&ScopeNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Looks up a descendant by relative names, e.g. `["ci", "build"]`.
    #[must_use]
    pub fn find(&self, names: &[&str]) -> Option<&ScopeNode> {
        names
            .iter()
            .try_fold(self, |node, name| node.child(name))
    }

    /// Pre-order traversal including `self`.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Number of nodes in the subtree carrying a declaration.
    #[must_use]
    pub fn declaration_count(&self) -> usize {
        self.walk().filter(|n| n.declared.is_some()).count()
    }

    /// All parse issues in the subtree, in traversal order.
    pub fn all_issues(&self) -> impl Iterator<Item = &ParseIssue> {
        self.walk().flat_map(|n| n.issues.iter())
    }

    #[must_use]
    pub fn has_fork_originated_trigger(&self) -> bool {
        self.triggers.iter().any(TriggerKind::is_fork_originated)
    }
}

/// Iterator returned by [`ScopeNode::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a ScopeNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a ScopeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
