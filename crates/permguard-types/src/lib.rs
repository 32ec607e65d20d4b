//! Permission model types for permguard.
//!
//! This crate is the foundation layer: plain data types with no I/O.
//!
//! # Crate Architecture
//!
//! ```text
//! permguard-types   (Scope, Level, PermissionSet, ScopeNode, Finding)  ◄── HERE
//!        ↑
//! permguard-engine  (parser, resolver, rules, reporter, matrix)
//!        ↑
//! permguard-cli     (`permguard` binary)
//! ```
//!
//! # Model
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`Scope`] | organization ⊃ repository ⊃ workflow ⊃ job ⊃ step |
//! | [`Level`] | `none < read < write` |
//! | [`PermissionKind`] | open set of token scopes, see [`KindRegistry`] |
//! | [`PermissionSet`] | blanket `read-all`/`write-all` or a per-kind mapping |
//! | [`ScopeNode`] | one node of a repository's tree, declaration optional |
//! | [`Finding`] | one reported violation |
//!
//! # Example
//!
//! ```
//! use permguard_types::{KindRegistry, PermissionSet, RawPermissions};
//!
//! let registry = KindRegistry::builtin();
//! let raw = RawPermissions::Mapped(vec![("contents".into(), "write".into())]);
//! let parsed = PermissionSet::from_raw(&raw, &registry).expect("valid block");
//! assert!(parsed.set.grants_write());
//! ```

#![forbid(unsafe_code)]

pub mod action;
pub mod error;
pub mod finding;
pub mod kind;
pub mod level;
pub mod node;
pub mod permission_set;
pub mod scope;
pub mod trigger;

pub use action::{ActionRef, ActionTarget};
pub use error::ParseIssue;
pub use finding::{Finding, FindingKey, Severity, SeverityParseError};
pub use kind::{KindInfo, KindRegistry, PermissionKind};
pub use level::{Level, LevelParseError};
pub use node::{ScopeNode, Walk};
pub use permission_set::{
    ParsedPermissions, PermissionBlockError, PermissionSet, RawPermissions, READ_ALL, WRITE_ALL,
};
pub use scope::{Scope, ScopePath};
pub use trigger::TriggerKind;
