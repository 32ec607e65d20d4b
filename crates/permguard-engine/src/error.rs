//! Engine error types.
//!
//! Only conditions that stop the whole run are errors. Per-document
//! problems are [`ParseIssue`](permguard_types::ParseIssue)s and end up
//! as findings.

use crate::config::ConfigError;
use crate::source::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Resolution has no baseline to start from.
    #[error(
        "organization default permissions are not configured \
         (set [organization].default_permissions or PERMGUARD_ORG_DEFAULT)"
    )]
    MissingOrganizationDefault,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("input error: {0}")]
    Source(#[from] SourceError),
}

impl EngineError {
    /// `true` when the run stopped for lack of an organization baseline.
    #[must_use]
    pub fn is_missing_baseline(&self) -> bool {
        matches!(self, Self::MissingOrganizationDefault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_default_message_names_the_setting() {
        let msg = EngineError::MissingOrganizationDefault.to_string();
        assert!(msg.contains("default_permissions"), "got: {msg}");
        assert!(EngineError::MissingOrganizationDefault.is_missing_baseline());
    }

    #[test]
    fn config_error_converts() {
        let err = EngineError::from(ConfigError::invalid_env_var("PERMGUARD_THRESHOLD", "bad"));
        assert!(!err.is_missing_baseline());
        assert!(err.to_string().contains("PERMGUARD_THRESHOLD"));
    }
}
