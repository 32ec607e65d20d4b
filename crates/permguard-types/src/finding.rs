//! Findings emitted by policy rules.

use crate::{Level, PermissionKind, ScopePath};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Severity of a finding, ordered `Info < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Most severe first.
    pub const DESCENDING: [Self; 3] = [Self::Critical, Self::Warning, Self::Info];

    /// One step less severe, used for reduced-confidence findings.
    #[must_use]
    pub fn lowered(self) -> Self {
        match self {
            Self::Critical => Self::Warning,
            Self::Warning | Self::Info => Self::Info,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid severity '{0}' (expected info, warning, or critical)")]
pub struct SeverityParseError(pub String);

impl FromStr for Severity {
    type Err = SeverityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(SeverityParseError(other.to_string())),
        }
    }
}

/// Identity of a finding: two findings with the same key are the same
/// violation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FindingKey {
    pub rule: String,
    pub path: ScopePath,
    pub kind: Option<PermissionKind>,
}

/// A single policy violation.
///
/// Findings order by severity (most severe first), then scope path, rule
/// name and kind, which is the order reports are printed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub rule: String,
    pub severity: Severity,
    pub path: ScopePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PermissionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    pub message: String,
    pub remediation: String,
}

impl Finding {
    #[must_use]
    pub fn new(
        rule: impl Into<String>,
        severity: Severity,
        path: ScopePath,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            severity,
            path,
            kind: None,
            level: None,
            message: message.into(),
            remediation: String::new(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: PermissionKind, level: Level) -> Self {
        self.kind = Some(kind);
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = remediation.into();
        self
    }

    #[must_use]
    pub fn key(&self) -> FindingKey {
        FindingKey {
            rule: self.rule.clone(),
            path: self.path.clone(),
            kind: self.kind.clone(),
        }
    }

    #[must_use]
    pub fn repository(&self) -> Option<&str> {
        self.path.repository_id()
    }
}

impl Ord for Finding {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .severity
            .cmp(&self.severity)
            .then_with(|| self.path.cmp(&other.path))
            .then_with(|| self.rule.cmp(&other.rule))
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.level.cmp(&other.level))
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| self.remediation.cmp(&other.remediation))
    }
}

impl PartialOrd for Finding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.rule, self.path)?;
        if let (Some(kind), Some(level)) = (&self.kind, self.level) {
            write!(f, " ({kind}: {level})")?;
        }
        write!(f, ": {}", self.message)
    }
}
