//! Finding aggregation, rendering and the pass/fail gate.
//!
//! A [`Report`] is always sorted (severity descending, then path, rule and
//! kind) and holds at most one finding per [`FindingKey`], so two runs over
//! the same input render byte-identical output regardless of the order in
//! which repositories finished.

use permguard_types::{Finding, FindingKey, Severity};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    findings: Vec<Finding>,
}

impl Report {
    /// Sorts and deduplicates. Of two findings with the same key, the more
    /// severe one is kept.
    #[must_use]
    pub fn new(mut findings: Vec<Finding>) -> Self {
        findings.sort();
        let mut seen: BTreeSet<FindingKey> = BTreeSet::new();
        findings.retain(|f| seen.insert(f.key()));
        Self { findings }
    }

    #[must_use]
    pub fn merge(self, other: Report) -> Self {
        let mut findings = self.findings;
        findings.extend(other.findings);
        Self::new(findings)
    }

    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    /// Findings grouped by repository, repositories in name order.
    #[must_use]
    pub fn by_repository(&self) -> BTreeMap<&str, Vec<&Finding>> {
        let mut groups: BTreeMap<&str, Vec<&Finding>> = BTreeMap::new();
        for finding in &self.findings {
            groups
                .entry(finding.repository().unwrap_or_default())
                .or_default()
                .push(finding);
        }
        groups
    }

    #[must_use]
    pub fn summary(&self, gate: &Gate) -> Summary {
        Summary {
            critical: self.count(Severity::Critical),
            warning: self.count(Severity::Warning),
            info: self.count(Severity::Info),
            passed: gate.passes(self),
        }
    }

    /// Human-readable listing, one block per repository.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for (repository, findings) in self.by_repository() {
            let _ = writeln!(out, "{repository}:");
            for finding in findings {
                let _ = writeln!(out, "  {finding}");
                if !finding.remediation.is_empty() {
                    let _ = writeln!(out, "    = help: {}", finding.remediation);
                }
            }
            out.push('\n');
        }
        out
    }

    /// # Errors
    ///
    /// Returns the serializer error, which does not happen for findings.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.findings)
    }
}

/// Severity threshold for failing a CI run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    pub threshold: Severity,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            threshold: Severity::Critical,
        }
    }
}

impl Gate {
    #[must_use]
    pub fn new(threshold: Severity) -> Self {
        Self { threshold }
    }

    /// Findings at or above the threshold that fail the run.
    pub fn blocking<'r>(&self, report: &'r Report) -> impl Iterator<Item = &'r Finding> + 'r {
        let threshold = self.threshold;
        report.findings().iter().filter(move |f| f.severity >= threshold)
    }

    #[must_use]
    pub fn passes(&self, report: &Report) -> bool {
        self.blocking(report).next().is_none()
    }

    /// 0 on pass, 1 on fail.
    #[must_use]
    pub fn exit_code(&self, report: &Report) -> u8 {
        u8::from(!self.passes(report))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub passed: bool,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} critical, {} warning, {} info, {}",
            self.critical,
            self.warning,
            self.info,
            if self.passed { "pass" } else { "fail" }
        )
    }
}
