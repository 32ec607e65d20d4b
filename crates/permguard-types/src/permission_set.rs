//! Permission sets declared at a scope.

use crate::{KindRegistry, Level, PermissionKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Blanket read on every kind.
pub const READ_ALL: &str = "read-all";
/// Blanket write on every kind.
pub const WRITE_ALL: &str = "write-all";

/// A `permissions:` declaration.
///
/// Either a blanket declaration or an explicit per-kind mapping, never both.
/// Kinds missing from an explicit mapping are `none`, which is how the
/// platform treats a mapped block.
///
/// # Example
///
/// ```
/// use permguard_types::{Level, PermissionKind, PermissionSet};
///
/// let set = PermissionSet::explicit([("contents", Level::Write)]);
/// assert_eq!(set.level(&PermissionKind::new("contents")), Level::Write);
/// assert_eq!(set.level(&PermissionKind::new("issues")), Level::None);
/// assert_eq!(PermissionSet::ReadAll.level(&PermissionKind::new("issues")), Level::Read);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionSet {
    ReadAll,
    WriteAll,
    Explicit(BTreeMap<PermissionKind, Level>),
}

impl PermissionSet {
    /// `permissions: {}`, every kind `none`.
    #[must_use]
    pub fn empty() -> Self {
        Self::Explicit(BTreeMap::new())
    }

    #[must_use]
    pub fn explicit<K: AsRef<str>>(entries: impl IntoIterator<Item = (K, Level)>) -> Self {
        Self::Explicit(
            entries
                .into_iter()
                .map(|(kind, level)| (PermissionKind::new(kind), level))
                .collect(),
        )
    }

    #[must_use]
    pub fn level(&self, kind: &PermissionKind) -> Level {
        match self {
            Self::ReadAll => Level::Read,
            Self::WriteAll => Level::Write,
            Self::Explicit(map) => map.get(kind).copied().unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn is_blanket(&self) -> bool {
        matches!(self, Self::ReadAll | Self::WriteAll)
    }

    /// Returns `true` if any kind is granted `write`.
    #[must_use]
    pub fn grants_write(&self) -> bool {
        match self {
            Self::ReadAll => false,
            Self::WriteAll => true,
            Self::Explicit(map) => map.values().any(|level| level.is_write()),
        }
    }

    /// Per-kind levels for every registered kind plus any extra kind the
    /// explicit mapping names.
    #[must_use]
    pub fn expand(&self, registry: &KindRegistry) -> BTreeMap<PermissionKind, Level> {
        let mut out: BTreeMap<PermissionKind, Level> = registry
            .kinds()
            .map(|kind| (kind.clone(), self.level(kind)))
            .collect();
        if let Self::Explicit(map) = self {
            for (kind, level) in map {
                out.insert(kind.clone(), *level);
            }
        }
        out
    }

    /// Validates a raw declaration against `registry`.
    ///
    /// Unknown kinds are dropped and returned in
    /// [`ParsedPermissions::unknown_kinds`]; everything else that is wrong
    /// rejects the whole block.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionBlockError`] for an unrecognized blanket value,
    /// an invalid level, a duplicated kind, or a mapping that mixes blanket
    /// and per-kind entries.
    pub fn from_raw(
        raw: &RawPermissions,
        registry: &KindRegistry,
    ) -> Result<ParsedPermissions, PermissionBlockError> {
        match raw {
            RawPermissions::Blanket(value) => {
                let set = match value.trim() {
                    READ_ALL => Self::ReadAll,
                    WRITE_ALL => Self::WriteAll,
                    other => return Err(PermissionBlockError::UnknownBlanket(other.to_string())),
                };
                Ok(ParsedPermissions {
                    set,
                    unknown_kinds: Vec::new(),
                })
            }
            RawPermissions::Mapped(entries) => {
                if let Some((blanket, _)) = entries
                    .iter()
                    .find(|(key, _)| key.trim() == READ_ALL || key.trim() == WRITE_ALL)
                {
                    return Err(PermissionBlockError::BlanketAndMapped {
                        blanket: blanket.trim().to_string(),
                    });
                }

                let mut map = BTreeMap::new();
                let mut unknown_kinds = Vec::new();
                for (key, value) in entries {
                    let kind = PermissionKind::new(key);
                    if !registry.contains(kind.as_str()) {
                        unknown_kinds.push(kind.as_str().to_string());
                        continue;
                    }
                    let level = value.parse::<Level>().map_err(|e| {
                        PermissionBlockError::InvalidLevel {
                            kind: kind.as_str().to_string(),
                            level: e.0,
                        }
                    })?;
                    if map.insert(kind.clone(), level).is_some() {
                        return Err(PermissionBlockError::Duplicate(kind.as_str().to_string()));
                    }
                }
                Ok(ParsedPermissions {
                    set: Self::Explicit(map),
                    unknown_kinds,
                })
            }
        }
    }
}

/// A declaration as written, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPermissions {
    /// `permissions: read-all`
    Blanket(String),
    /// `permissions: { kind: level, ... }` in document order.
    Mapped(Vec<(String, String)>),
}

/// Result of [`PermissionSet::from_raw`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPermissions {
    pub set: PermissionSet,
    pub unknown_kinds: Vec<String>,
}

/// Why a `permissions:` block was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionBlockError {
    #[error("unrecognized blanket declaration '{0}' (expected read-all or write-all)")]
    UnknownBlanket(String),

    #[error("invalid level '{level}' for '{kind}' (expected none, read, or write)")]
    InvalidLevel { kind: String, level: String },

    #[error("blanket '{blanket}' cannot be combined with per-kind entries")]
    BlanketAndMapped { blanket: String },

    #[error("'{0}' is declared more than once")]
    Duplicate(String),

    #[error("expected a string or a mapping, found {0}")]
    WrongShape(String),
}

impl PermissionBlockError {
    /// The field the error points at.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::UnknownBlanket(_) | Self::WrongShape(_) => "permissions",
            Self::InvalidLevel { kind, .. } => kind,
            Self::BlanketAndMapped { blanket } => blanket,
            Self::Duplicate(kind) => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped(entries: &[(&str, &str)]) -> RawPermissions {
        RawPermissions::Mapped(
            entries
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn blanket_forms() {
        let registry = KindRegistry::builtin();
        let parsed = PermissionSet::from_raw(&RawPermissions::Blanket("read-all".into()), &registry)
            .expect("read-all is valid");
        assert_eq!(parsed.set, PermissionSet::ReadAll);

        let err = PermissionSet::from_raw(&RawPermissions::Blanket("admin".into()), &registry)
            .expect_err("admin is not a blanket");
        assert_eq!(err.field(), "permissions");
    }

    #[test]
    fn mapped_block_with_unknown_kind_keeps_the_rest() {
        let registry = KindRegistry::builtin();
        let parsed = PermissionSet::from_raw(
            &mapped(&[("contents", "read"), ("telepathy", "write")]),
            &registry,
        )
        .expect("unknown kinds are not fatal");
        assert_eq!(parsed.unknown_kinds, vec!["telepathy".to_string()]);
        assert_eq!(parsed.set, PermissionSet::explicit([("contents", Level::Read)]));
    }

    #[test]
    fn invalid_level_rejects_block() {
        let registry = KindRegistry::builtin();
        let err = PermissionSet::from_raw(&mapped(&[("contents", "admin")]), &registry)
            .expect_err("admin is not a level");
        assert_eq!(
            err,
            PermissionBlockError::InvalidLevel {
                kind: "contents".into(),
                level: "admin".into()
            }
        );
        assert_eq!(err.field(), "contents");
    }

    #[test]
    fn blanket_mixed_with_mapping_rejected() {
        let registry = KindRegistry::builtin();
        let err = PermissionSet::from_raw(
            &mapped(&[("write-all", "true"), ("contents", "read")]),
            &registry,
        )
        .expect_err("mixed form is malformed");
        assert!(matches!(err, PermissionBlockError::BlanketAndMapped { .. }));
    }

    #[test]
    fn duplicate_kind_rejected() {
        let registry = KindRegistry::builtin();
        let err = PermissionSet::from_raw(
            &mapped(&[("contents", "read"), ("Contents", "write")]),
            &registry,
        )
        .expect_err("duplicate");
        assert_eq!(err, PermissionBlockError::Duplicate("contents".into()));
    }

    #[test]
    fn expand_covers_registry() {
        let registry = KindRegistry::builtin();
        let expanded = PermissionSet::empty().expand(&registry);
        assert_eq!(expanded.len(), registry.len());
        assert!(expanded.values().all(|l| *l == Level::None));

        let expanded = PermissionSet::WriteAll.expand(&registry);
        assert!(expanded.values().all(|l| *l == Level::Write));
    }

    #[test]
    fn grants_write() {
        assert!(PermissionSet::WriteAll.grants_write());
        assert!(!PermissionSet::ReadAll.grants_write());
        assert!(PermissionSet::explicit([("checks", Level::Write)]).grants_write());
        assert!(!PermissionSet::empty().grants_write());
    }
}
