use super::{Rule, WorkflowCtx};
use permguard_types::{Finding, Level};

pub const NAME: &str = "LeastPrivilegeExceeded";

/// Flags `write` grants a job's usage hint does not require.
///
/// Severity comes from the kind registry (`contents` and `id-token` are
/// critical). Jobs without a hint are still checked for explicitly
/// declared write kinds, one severity step lower; fallback-derived grants
/// are left to [`BlanketWriteDefault`](super::BlanketWriteDefault) and
/// [`ExplicitDeclarationRequired`](super::ExplicitDeclarationRequired).
pub struct LeastPrivilegeExceeded;

impl Rule for LeastPrivilegeExceeded {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "write grants must be required by the job"
    }

    fn check_workflow(&self, ctx: &WorkflowCtx<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (job, resolved) in ctx.resolved_jobs() {
            let hint = ctx.policy.usage.hint_for(&job.path);
            for kind in resolved.write_kinds() {
                let severity = ctx.policy.unused_write_severity(kind.as_str());
                let finding = match hint {
                    Some(ref hint) => {
                        if hint.requires_write(kind) {
                            continue;
                        }
                        let required = hint.required(kind);
                        Finding::new(
                            NAME,
                            severity,
                            job.path.clone(),
                            format!("`{kind}: write` is not required by the job's usage hint"),
                        )
                        .with_remediation(format!("reduce `{kind}` to `{required}`"))
                    }
                    None => {
                        let declared = resolved
                            .provenance_of(kind)
                            .is_some_and(|p| p.is_declared());
                        if !declared {
                            continue;
                        }
                        Finding::new(
                            NAME,
                            severity.lowered(),
                            job.path.clone(),
                            format!("`{kind}: write` is granted but no usage hint covers this job"),
                        )
                        .with_remediation(format!(
                            "reduced confidence: add a [usage.\"{}\"] hint, or reduce `{kind}` to `read` if unused",
                            job.path
                        ))
                    }
                };
                findings.push(finding.with_kind(kind.clone(), Level::Write));
            }
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::policy::Policy;
    use crate::rules::testing::run;
    use crate::usage::UsageHints;
    use permguard_types::{PermissionSet, Severity};

    const RELEASE: &str = r#"
on:
  push:
    branches: [main]
permissions: read-all
jobs:
  release:
    permissions:
      contents: write
      id-token: write
"#;

    fn policy_with_usage(toml: &str) -> Policy {
        let config = Config::parse(toml).expect("parse");
        Policy::new(PermissionSet::ReadAll)
            .with_usage(UsageHints::compile(&config.usage).expect("valid hints"))
    }

    #[test]
    fn hinted_writes_are_not_flagged() {
        let policy = policy_with_usage(
            "[usage.\"r1/workflow/release\"]\ncontents = \"write\"\nid-token = \"write\"\n",
        );
        assert!(run(&LeastPrivilegeExceeded, &policy, RELEASE).is_empty());
    }

    #[test]
    fn unused_id_token_is_critical() {
        let policy = policy_with_usage("[usage.\"r1/workflow/release\"]\ncontents = \"write\"\n");
        let findings = run(&LeastPrivilegeExceeded, &policy, RELEASE);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].kind.as_ref().map(|k| k.as_str()), Some("id-token"));
        assert_eq!(findings[0].remediation, "reduce `id-token` to `none`");
    }

    #[test]
    fn missing_hint_degrades_severity() {
        let policy = Policy::new(PermissionSet::ReadAll);
        let findings = run(&LeastPrivilegeExceeded, &policy, RELEASE);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.severity == Severity::Warning));
        assert!(findings[0].remediation.starts_with("reduced confidence"));
    }

    #[test]
    fn fallback_writes_are_skipped_without_hint() {
        let policy = Policy::new(PermissionSet::ReadAll);
        let findings = run(
            &LeastPrivilegeExceeded,
            &policy,
            "on: push\njobs:\n  build: {runs-on: x}\n",
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn fallback_writes_flagged_with_hint() {
        let policy = policy_with_usage("[usage.\"r1/workflow/*\"]\ncontents = \"read\"\n");
        let findings = run(
            &LeastPrivilegeExceeded,
            &policy,
            "on: push\njobs:\n  build: {runs-on: x}\n",
        );
        // every registered kind is write under the push fallback
        assert_eq!(findings.len(), policy.registry.len());
    }
}
