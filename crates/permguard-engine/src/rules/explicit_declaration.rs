use super::{Rule, WorkflowCtx};
use permguard_types::{Finding, Severity};

pub const NAME: &str = "ExplicitDeclarationRequired";

/// One finding per workflow that has jobs running on the platform default
/// token, i.e. with no declaration anywhere in their chain.
pub struct ExplicitDeclarationRequired;

impl Rule for ExplicitDeclarationRequired {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "jobs must not rely on the platform default token"
    }

    fn check_workflow(&self, ctx: &WorkflowCtx<'_>) -> Vec<Finding> {
        let total = ctx.jobs().count();
        let undeclared: Vec<&str> = ctx
            .resolved_jobs()
            .filter(|(_, resolved)| !resolved.is_explicit())
            .map(|(job, _)| job.name.as_str())
            .collect();
        if undeclared.is_empty() {
            return Vec::new();
        }

        let remediation = if undeclared.len() == total {
            "add a top-level `permissions:` block, e.g. `permissions: { contents: read }`"
                .to_string()
        } else {
            format!(
                "declare `permissions:` at the top level or on jobs: {}",
                undeclared.join(", ")
            )
        };
        vec![Finding::new(
            NAME,
            Severity::Warning,
            ctx.workflow.path.clone(),
            format!(
                "{} of {total} job(s) rely on the platform default token",
                undeclared.len()
            ),
        )
        .with_remediation(remediation)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;
    use crate::rules::testing::run;
    use permguard_types::PermissionSet;

    #[test]
    fn one_finding_per_workflow() {
        let policy = Policy::new(PermissionSet::ReadAll);
        let findings = run(
            &ExplicitDeclarationRequired,
            &policy,
            "on: push\njobs:\n  a: {runs-on: x}\n  b: {runs-on: x}\n",
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].path.to_string(), "r1/workflow");
        assert!(findings[0].message.starts_with("2 of 2"));
    }

    #[test]
    fn partially_declared_lists_jobs() {
        let policy = Policy::new(PermissionSet::ReadAll);
        let findings = run(
            &ExplicitDeclarationRequired,
            &policy,
            "on: push\njobs:\n  a:\n    permissions: read-all\n  b: {runs-on: x}\n",
        );
        assert_eq!(findings.len(), 1);
        assert!(findings[0].remediation.ends_with("jobs: b"), "{}", findings[0].remediation);
    }

    #[test]
    fn workflow_block_satisfies_rule() {
        let policy = Policy::new(PermissionSet::ReadAll);
        let findings = run(
            &ExplicitDeclarationRequired,
            &policy,
            "on: push\npermissions: {}\njobs:\n  a: {runs-on: x}\n",
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn repository_override_satisfies_rule() {
        let policy = Policy::new(PermissionSet::ReadAll)
            .with_repository_override("r1", PermissionSet::ReadAll);
        let findings = run(
            &ExplicitDeclarationRequired,
            &policy,
            "on: push\njobs:\n  a: {runs-on: x}\n",
        );
        assert!(findings.is_empty());
    }
}
