use super::{RepositoryCtx, Rule};
use permguard_types::{Finding, ParseIssue, PermissionKind, Severity};

pub const NAME: &str = "ParseIssues";

/// Surfaces parse-time issues as `warning` findings named after the issue
/// (`MalformedPermissionBlock`, `UnknownPermissionKind`,
/// `MalformedDocument`).
pub struct ParseIssues;

impl Rule for ParseIssues {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "permission declarations must be well-formed"
    }

    fn check_repository(&self, ctx: &RepositoryCtx<'_>) -> Vec<Finding> {
        ctx.repository.all_issues().map(to_finding).collect()
    }
}

fn to_finding(issue: &ParseIssue) -> Finding {
    let finding = Finding::new(issue.code(), Severity::Warning, issue.path().clone(), issue.to_string());
    match issue {
        ParseIssue::MalformedPermissionBlock { .. } => finding.with_remediation(
            "fix the block; until then this scope inherits its parent's permissions",
        ),
        ParseIssue::UnknownPermissionKind { kind, .. } => {
            let mut finding = finding.with_remediation(format!(
                "remove `{kind}` or register it under [kinds.{kind}] in the configuration"
            ));
            finding.kind = Some(PermissionKind::new(kind));
            finding
        }
        ParseIssue::MalformedDocument { .. } => {
            finding.with_remediation("fix the workflow document; it was not analyzed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;
    use crate::rules::testing::run;
    use permguard_types::PermissionSet;

    #[test]
    fn issues_become_warnings() {
        let policy = Policy::new(PermissionSet::ReadAll);
        let findings = run(
            &ParseIssues,
            &policy,
            "on: push\npermissions:\n  telepathy: write\njobs:\n  a:\n    permissions:\n      contents: admin\n",
        );
        let rules: Vec<&str> = findings.iter().map(|f| f.rule.as_str()).collect();
        assert_eq!(rules, ["UnknownPermissionKind", "MalformedPermissionBlock"]);
        assert!(findings.iter().all(|f| f.severity == Severity::Warning));
        assert_eq!(findings[0].kind.as_ref().map(|k| k.as_str()), Some("telepathy"));
    }

    #[test]
    fn broken_document() {
        let policy = Policy::new(PermissionSet::ReadAll);
        let findings = run(&ParseIssues, &policy, ":\n  - [");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "MalformedDocument");
        assert_eq!(findings[0].path.to_string(), "r1/workflow");
    }
}
