//! Externally supplied usage hints.
//!
//! Which permissions a job really needs depends on what its steps do, and
//! that cannot be inferred reliably from opaque actions. Hints are
//! therefore supplied by the caller, keyed by scope-path glob:
//!
//! ```toml
//! [usage."r1/release/publish"]
//! contents = "write"
//! id-token = "write"
//! ```

use crate::config::ConfigError;
use permguard_types::{Level, PermissionKind, ScopePath};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct HintEntry {
    pattern: glob::Pattern,
    required: BTreeMap<PermissionKind, Level>,
}

/// Compiled usage hints.
#[derive(Debug, Clone, Default)]
pub struct UsageHints {
    entries: Vec<HintEntry>,
}

/// Required levels for one job, joined over every matching pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageHint {
    required: BTreeMap<PermissionKind, Level>,
}

impl UsageHint {
    /// Kinds the hint does not mention are not required at all.
    #[must_use]
    pub fn required(&self, kind: &PermissionKind) -> Level {
        self.required.get(kind).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn requires_write(&self, kind: &PermissionKind) -> bool {
        self.required(kind).is_write()
    }
}

impl UsageHints {
    /// Compiles the `[usage]` table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] for a bad glob and
    /// [`ConfigError::InvalidLevel`] for an unrecognized level.
    pub fn compile(table: &BTreeMap<String, BTreeMap<String, String>>) -> Result<Self, ConfigError> {
        let mut entries = Vec::with_capacity(table.len());
        for (pattern, kinds) in table {
            let compiled = glob::Pattern::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source: e,
            })?;
            let mut required = BTreeMap::new();
            for (kind, level) in kinds {
                let level = level.parse::<Level>().map_err(|e| ConfigError::InvalidLevel {
                    field: format!("usage.\"{pattern}\""),
                    kind: kind.clone(),
                    level: e.0,
                })?;
                required.insert(PermissionKind::new(kind), level);
            }
            entries.push(HintEntry {
                pattern: compiled,
                required,
            });
        }
        Ok(Self { entries })
    }

    /// Hint for a job, or `None` when no pattern matches it.
    #[must_use]
    pub fn hint_for(&self, path: &ScopePath) -> Option<UsageHint> {
        let rendered = path.to_string();
        let mut matched = false;
        let mut required: BTreeMap<PermissionKind, Level> = BTreeMap::new();
        for entry in self.entries.iter().filter(|e| e.pattern.matches(&rendered)) {
            matched = true;
            for (kind, level) in &entry.required {
                let slot = required.entry(kind.clone()).or_default();
                *slot = (*slot).max(*level);
            }
        }
        matched.then_some(UsageHint { required })
    }
}
