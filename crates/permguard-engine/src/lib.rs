//! Workflow token permission policy engine.
//!
//! Ingests workflow documents for many repositories, resolves the
//! effective token permissions at every job and step, and evaluates a
//! catalogue of least-privilege rules over them.
//!
//! | Rule | Severity | Flags |
//! |------|----------|-------|
//! | `ExplicitDeclarationRequired` | warning | jobs relying on the platform default token |
//! | `LeastPrivilegeExceeded` | per kind | `write` not required by the job's usage hint |
//! | `ForkTriggerWriteToken` | critical | write token under `pull_request_target` / `workflow_run` |
//! | `BlanketWriteDefault` | critical | `write-all`, declared or implied |
//! | `UnpinnedAction` | warning | third-party actions on mutable tags |
//! | `ParseIssues` | warning | malformed blocks, unknown kinds, broken documents |
//!
//! # Example
//!
//! ```
//! use permguard_engine::{AnalysisInput, Engine, Gate, Policy, RuleSet};
//! use permguard_types::PermissionSet;
//!
//! let input = AnalysisInput::new().with_document(
//!     "r1",
//!     ".github/workflows/ci.yml",
//!     "on: pull_request_target\npermissions: write-all\njobs:\n  test: {runs-on: x}\n",
//! );
//! let engine = Engine::new(Policy::new(PermissionSet::ReadAll), RuleSet::default());
//! let analysis = engine.analyze(&input);
//!
//! assert!(!Gate::default().passes(&analysis.report));
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod parser;
pub mod policy;
pub mod reporter;
pub mod resolver;
pub mod rules;
pub mod source;
pub mod usage;

pub use config::{Config, ConfigError, ConfigLoader};
pub use engine::{Analysis, Engine, RepositoryAnalysis, ANALYSIS_ABORTED};
pub use error::EngineError;
pub use matrix::{AuditMatrix, MatrixRow};
pub use parser::WorkflowParser;
pub use policy::Policy;
pub use reporter::{Gate, Report, Summary};
pub use resolver::{Provenance, Resolution, ResolvedPrivilege, Resolver};
pub use rules::{Rule, RuleSet};
pub use source::{load_organization, load_repository, AnalysisInput, RepositoryDocuments};
pub use usage::UsageHints;
