use super::{Rule, WorkflowCtx};
use permguard_types::{Finding, Severity};

pub const NAME: &str = "UnpinnedAction";

/// Owners whose actions are exempt unless configured otherwise.
pub const DEFAULT_TRUSTED_OWNERS: &[&str] = &["actions", "github"];

/// Third-party `uses:` references that follow a mutable tag or branch.
pub struct UnpinnedAction {
    trusted_owners: Vec<String>,
}

impl Default for UnpinnedAction {
    fn default() -> Self {
        Self::with_trusted_owners(DEFAULT_TRUSTED_OWNERS.iter().map(|s| (*s).to_string()))
    }
}

impl UnpinnedAction {
    #[must_use]
    pub fn with_trusted_owners(owners: impl IntoIterator<Item = String>) -> Self {
        Self {
            trusted_owners: owners.into_iter().map(|o| o.to_ascii_lowercase()).collect(),
        }
    }

    fn is_trusted(&self, owner: Option<&str>) -> bool {
        owner.is_some_and(|o| self.trusted_owners.iter().any(|t| t.eq_ignore_ascii_case(o)))
    }
}

impl Rule for UnpinnedAction {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "third-party actions must be pinned by commit SHA"
    }

    fn check_workflow(&self, ctx: &WorkflowCtx<'_>) -> Vec<Finding> {
        ctx.workflow
            .walk()
            .filter_map(|node| node.uses.as_ref().map(|uses| (node, uses)))
            .filter(|(_, uses)| !uses.is_pinned() && !self.is_trusted(uses.owner()))
            .map(|(node, uses)| {
                let reference = uses.mutable_reference().unwrap_or_default();
                let message = if reference.is_empty() {
                    format!("`uses: {uses}` has no version reference")
                } else {
                    format!("`uses: {uses}` follows mutable reference `{reference}`")
                };
                Finding::new(NAME, Severity::Warning, node.path.clone(), message)
                    .with_remediation("pin to a full 40-character commit SHA (or image digest) and note the tag in a comment")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;
    use crate::rules::testing::run;
    use permguard_types::PermissionSet;

    const STEPS: &str = r#"
on: push
permissions: read-all
jobs:
  build:
    steps:
      - uses: actions/checkout@v4
      - id: cache
        uses: acme/cache-action@v2
      - uses: acme/setup@8e5e7e5ab8b370d6c329ec480221332ada57f0ab
      - uses: ./.github/actions/local
      - uses: docker://alpine:3.20
  shared:
    uses: acme/workflows/.github/workflows/ci.yml@main
"#;

    #[test]
    fn flags_third_party_tags() {
        let policy = Policy::new(PermissionSet::ReadAll);
        let findings = run(&UnpinnedAction::default(), &policy, STEPS);
        let paths: Vec<String> = findings.iter().map(|f| f.path.to_string()).collect();
        assert_eq!(
            paths,
            [
                "r1/workflow/build/cache",
                "r1/workflow/build/step-5",
                "r1/workflow/shared"
            ]
        );
        assert!(findings[0].message.contains("`v2`"));
    }

    #[test]
    fn trusted_owners_are_configurable() {
        let policy = Policy::new(PermissionSet::ReadAll);
        let rule = UnpinnedAction::with_trusted_owners(["ACME".to_string()]);
        let findings = run(&rule, &policy, STEPS);
        let paths: Vec<String> = findings.iter().map(|f| f.path.to_string()).collect();
        assert_eq!(paths, ["r1/workflow/build/step-1", "r1/workflow/build/step-5"]);
    }
}
