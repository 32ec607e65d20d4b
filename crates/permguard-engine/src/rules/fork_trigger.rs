use super::{Rule, WorkflowCtx};
use permguard_types::{Finding, Level, Severity, TriggerKind};

pub const NAME: &str = "ForkTriggerWriteToken";

/// Fork-originated code must never run with a write token.
///
/// One finding per job whose resolved privilege contains any `write`
/// kind; the finding's kind is the riskiest one and the message lists the
/// rest. Steps share their job's privilege and are covered by it. When
/// fork approval is not required, plain `pull_request` workflows are
/// flagged too, at `warning`.
pub struct ForkTriggerWriteToken;

impl Rule for ForkTriggerWriteToken {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "fork-originated triggers must not receive a write token"
    }

    fn check_workflow(&self, ctx: &WorkflowCtx<'_>) -> Vec<Finding> {
        let triggers = &ctx.workflow.triggers;
        let fork_triggers: Vec<&str> = triggers
            .iter()
            .filter(|t| t.is_fork_originated())
            .map(TriggerKind::as_str)
            .collect();

        let (severity, trigger_list) = if !fork_triggers.is_empty() {
            (Severity::Critical, fork_triggers.join(", "))
        } else if !ctx.policy.fork_approval_required && triggers.contains(&TriggerKind::PullRequest)
        {
            (Severity::Warning, TriggerKind::PullRequest.as_str().to_string())
        } else {
            return Vec::new();
        };

        let mut findings = Vec::new();
        for (job, resolved) in ctx.resolved_jobs() {
            let kinds = ctx.write_kinds_by_risk(resolved);
            let Some(riskiest) = kinds.first() else {
                continue;
            };
            let listed = kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ");
            findings.push(
                Finding::new(
                    NAME,
                    severity,
                    job.path.clone(),
                    format!("job runs on {trigger_list} with write access to: {listed}"),
                )
                .with_kind(riskiest.clone(), Level::Write)
                .with_remediation(
                    "declare `permissions: read-all` (or narrower) for this job, or move \
                     write steps to a separate workflow triggered by `workflow_run` without checkout of fork code",
                ),
            );
        }
        findings
    }
}
