//! Parse-time issues attached to scope nodes.
//!
//! These are recoverable: the parser records them on the offending node
//! and keeps going, and the engine later reports them as `warning`
//! findings.

use crate::{PermissionBlockError, ScopePath};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIssue {
    /// A `permissions:` block that cannot be interpreted. The node
    /// inherits as if nothing were declared.
    #[error("malformed permissions block at {path} (field '{field}'): {reason}")]
    MalformedPermissionBlock {
        path: ScopePath,
        field: String,
        reason: String,
    },

    /// A kind the registry does not know. Only that entry is dropped.
    #[error("unknown permission kind '{kind}' at {path}")]
    UnknownPermissionKind { path: ScopePath, kind: String },

    /// The document is not valid YAML or not a workflow mapping.
    #[error("malformed workflow document at {path}: {reason}")]
    MalformedDocument { path: ScopePath, reason: String },
}

impl ParseIssue {
    #[must_use]
    pub fn malformed_block(path: ScopePath, err: &PermissionBlockError) -> Self {
        Self::MalformedPermissionBlock {
            path,
            field: err.field().to_string(),
            reason: err.to_string(),
        }
    }

    /// Stable name, also used as the finding's rule name.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedPermissionBlock { .. } => "MalformedPermissionBlock",
            Self::UnknownPermissionKind { .. } => "UnknownPermissionKind",
            Self::MalformedDocument { .. } => "MalformedDocument",
        }
    }

    #[must_use]
    pub fn path(&self) -> &ScopePath {
        match self {
            Self::MalformedPermissionBlock { path, .. }
            | Self::UnknownPermissionKind { path, .. }
            | Self::MalformedDocument { path, .. } => path,
        }
    }

    /// The offending field, when there is one.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MalformedPermissionBlock { field, .. } => Some(field),
            Self::UnknownPermissionKind { kind, .. } => Some(kind),
            Self::MalformedDocument { .. } => None,
        }
    }
}
