//! The validated organization policy the pipeline runs against.

use crate::config::{Config, ConfigError, PermissionSpec};
use crate::error::EngineError;
use crate::usage::UsageHints;
use permguard_types::{KindRegistry, PermissionSet, Severity, TriggerKind};
use std::collections::BTreeMap;

/// Triggers whose platform fallback is assumed to be `write-all`.
pub const WRITE_ALL_FALLBACK_TRIGGERS: &[TriggerKind] = &[
    TriggerKind::Push,
    TriggerKind::PullRequest,
    TriggerKind::PullRequestTarget,
];

/// Everything the resolver and rules need besides the documents.
#[derive(Debug, Clone)]
pub struct Policy {
    pub registry: KindRegistry,
    pub org_default: PermissionSet,
    pub assume_platform_fallback: bool,
    pub fork_approval_required: bool,
    pub fallback: BTreeMap<TriggerKind, PermissionSet>,
    pub repository_overrides: BTreeMap<String, PermissionSet>,
    pub usage: UsageHints,
}

impl Policy {
    /// Policy with built-in registry and fallback table.
    #[must_use]
    pub fn new(org_default: PermissionSet) -> Self {
        Self {
            registry: KindRegistry::builtin(),
            org_default,
            assume_platform_fallback: true,
            fork_approval_required: true,
            fallback: builtin_fallback(),
            repository_overrides: BTreeMap::new(),
            usage: UsageHints::default(),
        }
    }

    #[must_use]
    pub fn with_repository_override(mut self, repo: impl Into<String>, set: PermissionSet) -> Self {
        self.repository_overrides.insert(repo.into(), set);
        self
    }

    #[must_use]
    pub fn with_usage(mut self, usage: UsageHints) -> Self {
        self.usage = usage;
        self
    }

    #[must_use]
    pub fn with_platform_fallback(mut self, assume: bool) -> Self {
        self.assume_platform_fallback = assume;
        self
    }

    #[must_use]
    pub fn with_fork_approval(mut self, required: bool) -> Self {
        self.fork_approval_required = required;
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, trigger: TriggerKind, set: PermissionSet) -> Self {
        self.fallback.insert(trigger, set);
        self
    }

    /// Validates a loaded config.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingOrganizationDefault`] when no baseline is
    /// configured, [`EngineError::Config`] for any invalid entry.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let mut registry = KindRegistry::builtin();
        for (kind, kc) in &config.kinds {
            let unused_write = kc
                .unused_write
                .unwrap_or_else(|| registry.unused_write_severity(kind));
            let description = kc
                .description
                .clone()
                .or_else(|| registry.get(kind).map(|info| info.description.clone()))
                .unwrap_or_default();
            registry.register(kind, unused_write, description);
        }

        let org_spec = config
            .organization
            .default_permissions
            .as_ref()
            .ok_or(EngineError::MissingOrganizationDefault)?;
        let org_default = compile_spec(org_spec, "organization.default_permissions", &registry)?;

        let mut fallback = builtin_fallback();
        for (trigger, spec) in &config.fallback {
            let set = compile_spec(spec, &format!("fallback.{trigger}"), &registry)?;
            fallback.insert(TriggerKind::parse(trigger), set);
        }

        let mut repository_overrides = BTreeMap::new();
        for (repo, rc) in &config.repositories {
            if let Some(ref spec) = rc.default_permissions {
                let set = compile_spec(
                    spec,
                    &format!("repositories.{repo}.default_permissions"),
                    &registry,
                )?;
                repository_overrides.insert(repo.clone(), set);
            }
        }

        let usage = UsageHints::compile(&config.usage)?;

        Ok(Self {
            registry,
            org_default,
            assume_platform_fallback: config.organization.assume_platform_fallback,
            fork_approval_required: config.organization.fork_approval_required,
            fallback,
            repository_overrides,
            usage,
        })
    }

    /// Unused-write risk for a kind, from the registry.
    #[must_use]
    pub fn unused_write_severity(&self, kind: &str) -> Severity {
        self.registry.unused_write_severity(kind)
    }
}

fn builtin_fallback() -> BTreeMap<TriggerKind, PermissionSet> {
    WRITE_ALL_FALLBACK_TRIGGERS
        .iter()
        .map(|t| (t.clone(), PermissionSet::WriteAll))
        .collect()
}

// Config is stricter than documents: an unknown kind is an error here.
fn compile_spec(
    spec: &PermissionSpec,
    field: &str,
    registry: &KindRegistry,
) -> Result<PermissionSet, ConfigError> {
    let parsed = PermissionSet::from_raw(&spec.to_raw(), registry).map_err(|e| {
        ConfigError::InvalidPermissions {
            field: field.to_string(),
            source: e,
        }
    })?;
    if let Some(kind) = parsed.unknown_kinds.into_iter().next() {
        return Err(ConfigError::UnknownKind {
            field: field.to_string(),
            kind,
        });
    }
    Ok(parsed.set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use permguard_types::{Level, PermissionBlockError};

    #[test]
    fn missing_org_default_is_fatal() {
        let err = Policy::from_config(&Config::default()).expect_err("no baseline");
        assert!(matches!(err, EngineError::MissingOrganizationDefault));
    }

    #[test]
    fn builtin_fallback_covers_push_and_pull_requests() {
        let policy = Policy::new(PermissionSet::ReadAll);
        for trigger in WRITE_ALL_FALLBACK_TRIGGERS {
            assert_eq!(policy.fallback.get(trigger), Some(&PermissionSet::WriteAll));
        }
        assert!(!policy.fallback.contains_key(&TriggerKind::Schedule));
    }

    #[test]
    fn from_config_compiles_every_section() {
        let config = Config::parse(
            r#"
[organization]
default_permissions = { contents = "read" }
assume_platform_fallback = false

[fallback]
push = "read-all"

[repositories.svc]
default_permissions = "write-all"

[kinds.artifact-metadata]
unused_write = "critical"
"#,
        )
        .expect("parse");
        let policy = Policy::from_config(&config).expect("valid");
        assert_eq!(
            policy.org_default,
            PermissionSet::explicit([("contents", Level::Read)])
        );
        assert!(!policy.assume_platform_fallback);
        assert_eq!(policy.fallback.get(&TriggerKind::Push), Some(&PermissionSet::ReadAll));
        assert_eq!(
            policy.fallback.get(&TriggerKind::PullRequest),
            Some(&PermissionSet::WriteAll)
        );
        assert_eq!(
            policy.repository_overrides.get("svc"),
            Some(&PermissionSet::WriteAll)
        );
        assert_eq!(
            policy.unused_write_severity("artifact-metadata"),
            Severity::Critical
        );
    }

    #[test]
    fn unknown_kind_in_config_is_rejected() {
        let config = Config::parse(
            "[organization]\ndefault_permissions = { telepathy = \"read\" }\n",
        )
        .expect("parse");
        let err = Policy::from_config(&config).expect_err("unknown kind");
        assert!(matches!(
            err,
            EngineError::Config(ConfigError::UnknownKind { .. })
        ));
    }

    #[test]
    fn compact_pair_without_level_is_rejected() {
        let mut config = Config::default();
        config.organization.default_permissions =
            Some(PermissionSpec::from_compact("contents=read,issues"));
        let err = Policy::from_config(&config).expect_err("missing level");
        assert!(matches!(
            err,
            EngineError::Config(ConfigError::InvalidPermissions {
                source: PermissionBlockError::InvalidLevel { ref kind, .. },
                ..
            }) if kind == "issues"
        ));
    }
}
