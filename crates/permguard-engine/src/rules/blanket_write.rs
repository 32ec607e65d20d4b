use super::{RepositoryCtx, Rule, WorkflowCtx};
use permguard_types::{Finding, PermissionSet, ScopeNode, Severity};

pub const NAME: &str = "BlanketWriteDefault";

/// `write-all` anywhere it is declared, plus workflows whose undeclared
/// jobs end up with write on every kind anyway.
pub struct BlanketWriteDefault;

const REMEDIATION: &str =
    "replace `write-all` with an explicit mapping of the kinds the jobs need, e.g. `{ contents: read }`";

fn declared_write_all(node: &ScopeNode) -> Option<Finding> {
    (node.declared == Some(PermissionSet::WriteAll)).then(|| {
        Finding::new(
            NAME,
            Severity::Critical,
            node.path.clone(),
            format!("{} declares blanket `write-all`", node.scope),
        )
        .with_remediation(REMEDIATION)
    })
}

impl Rule for BlanketWriteDefault {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "no scope may hold blanket write-all"
    }

    fn check_repository(&self, ctx: &RepositoryCtx<'_>) -> Vec<Finding> {
        declared_write_all(ctx.repository).into_iter().collect()
    }

    fn check_workflow(&self, ctx: &WorkflowCtx<'_>) -> Vec<Finding> {
        let mut findings: Vec<Finding> = std::iter::once(ctx.workflow)
            .chain(ctx.jobs())
            .filter_map(declared_write_all)
            .collect();

        let registry = &ctx.policy.registry;
        let implicit: Vec<&str> = ctx
            .resolved_jobs()
            .filter(|(_, r)| !r.is_explicit())
            .filter(|(_, r)| registry.kinds().all(|kind| r.level(kind).is_write()))
            .map(|(job, _)| job.name.as_str())
            .collect();
        if !implicit.is_empty() {
            findings.push(
                Finding::new(
                    NAME,
                    Severity::Critical,
                    ctx.workflow.path.clone(),
                    format!(
                        "undeclared job(s) {} run with an implicit `write-all` token",
                        implicit.join(", ")
                    ),
                )
                .with_remediation("add a top-level `permissions:` block so the default token is not used"),
            );
        }
        findings
    }
}
