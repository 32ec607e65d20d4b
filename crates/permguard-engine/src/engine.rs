//! The analysis pipeline.
//!
//! ```text
//! AnalysisInput ─► WorkflowParser ─► Resolver ─► RuleSet ─► Report
//!                                         └──────► AuditMatrix
//! ```
//!
//! Repositories are independent. [`Engine::analyze`] walks them in order;
//! [`Engine::analyze_concurrent`] gives each its own blocking task and
//! merges the results by sorting, so both produce identical output.

use crate::config::Config;
use crate::error::EngineError;
use crate::matrix::AuditMatrix;
use crate::parser::WorkflowParser;
use crate::policy::Policy;
use crate::reporter::{Gate, Report, Summary};
use crate::resolver::Resolver;
use crate::rules::{RepositoryCtx, RuleSet};
use crate::source::{AnalysisInput, RepositoryDocuments};
use permguard_types::{Finding, ScopePath, Severity};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Finding emitted when a repository's analysis task dies.
pub const ANALYSIS_ABORTED: &str = "AnalysisAborted";

/// Result of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    pub report: Report,
    pub matrix: AuditMatrix,
    /// The input held no documents at all.
    pub empty_input: bool,
}

impl Analysis {
    /// Structured output: summary, findings and matrix in one document.
    ///
    /// # Errors
    ///
    /// Returns the serializer error, which does not happen in practice.
    pub fn to_json(&self, gate: &Gate) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct Document<'a> {
            summary: Summary,
            findings: &'a [Finding],
            matrix: &'a AuditMatrix,
        }
        serde_json::to_string_pretty(&Document {
            summary: self.report.summary(gate),
            findings: self.report.findings(),
            matrix: &self.matrix,
        })
    }
}

/// Findings and matrix rows of a single repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryAnalysis {
    pub findings: Vec<Finding>,
    pub matrix: AuditMatrix,
}

#[derive(Debug, Clone)]
pub struct Engine {
    policy: Arc<Policy>,
    rules: Arc<RuleSet>,
}

impl Engine {
    #[must_use]
    pub fn new(policy: Policy, rules: RuleSet) -> Self {
        Self {
            policy: Arc::new(policy),
            rules: Arc::new(rules),
        }
    }

    /// Validates the config and builds the rule set from it.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingOrganizationDefault`] when there is no
    /// baseline; [`EngineError::Config`] for invalid entries.
    pub fn from_config(config: &Config, rule_filter: Option<&str>) -> Result<Self, EngineError> {
        let policy = Policy::from_config(config)?;
        let rules = RuleSet::from_config(config, rule_filter);
        Ok(Self::new(policy, rules))
    }

    #[must_use]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Parses, resolves and evaluates one repository.
    #[must_use]
    pub fn analyze_repository(&self, id: &str, docs: &RepositoryDocuments) -> RepositoryAnalysis {
        let policy = &*self.policy;
        let tree = WorkflowParser::new(&policy.registry).parse_repository(
            id,
            docs,
            policy.repository_overrides.get(id),
        );
        let resolution = Resolver::new(policy).resolve(&tree);
        let ctx = RepositoryCtx {
            repository: &tree,
            resolution: &resolution,
            policy,
        };
        let findings = self.rules.evaluate(&ctx);
        let matrix = AuditMatrix::build(&tree, &resolution, &policy.registry);
        debug!(
            repository = %id,
            findings = findings.len(),
            jobs = matrix.rows.len(),
            "Repository analyzed"
        );
        RepositoryAnalysis { findings, matrix }
    }

    /// Analyzes every repository on the current thread.
    #[must_use]
    pub fn analyze(&self, input: &AnalysisInput) -> Analysis {
        if let Some(empty) = self.check_empty(input) {
            return empty;
        }
        let results = input
            .repositories
            .iter()
            .map(|(id, docs)| self.analyze_repository(id, docs))
            .collect();
        self.merge(results)
    }

    /// Analyzes repositories on tokio's blocking pool, one task each.
    ///
    /// A panic while analyzing one repository becomes an
    /// [`ANALYSIS_ABORTED`] warning for that repository; the others are
    /// unaffected.
    pub async fn analyze_concurrent(&self, input: AnalysisInput) -> Analysis {
        if let Some(empty) = self.check_empty(&input) {
            return empty;
        }

        let handles: Vec<_> = input
            .repositories
            .into_iter()
            .map(|(id, docs)| {
                let engine = self.clone();
                let task_id = id.clone();
                let handle =
                    tokio::task::spawn_blocking(move || engine.analyze_repository(&task_id, &docs));
                (id, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(repository = %id, error = %e, "Repository analysis aborted");
                    results.push(RepositoryAnalysis {
                        findings: vec![aborted(&id, &e.to_string())],
                        matrix: AuditMatrix::default(),
                    });
                }
            }
        }
        self.merge(results)
    }

    fn check_empty(&self, input: &AnalysisInput) -> Option<Analysis> {
        if !input.is_empty() {
            return None;
        }
        warn!("No workflow documents to analyze");
        Some(Analysis {
            empty_input: true,
            matrix: AuditMatrix::from_rows(Vec::new(), &self.policy.registry),
            ..Analysis::default()
        })
    }

    fn merge(&self, results: Vec<RepositoryAnalysis>) -> Analysis {
        let registry = &self.policy.registry;
        let (report, matrix) = results.into_iter().fold(
            (Report::default(), AuditMatrix::from_rows(Vec::new(), registry)),
            |(report, matrix), result| {
                (
                    report.merge(Report::new(result.findings)),
                    matrix.merge(result.matrix, registry),
                )
            },
        );
        info!(
            findings = report.len(),
            critical = report.count(Severity::Critical),
            jobs = matrix.rows.len(),
            "Analysis complete"
        );
        Analysis {
            report,
            matrix,
            empty_input: false,
        }
    }
}

fn aborted(repository: &str, reason: &str) -> Finding {
    Finding::new(
        ANALYSIS_ABORTED,
        Severity::Warning,
        ScopePath::repository(repository),
        format!("analysis of this repository did not complete: {reason}"),
    )
    .with_remediation("re-run with --debug and report the failing workflow document")
}
