//! Access levels for a single permission kind.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Access level granted to the workflow token for one permission kind.
///
/// Ordered `None < Read < Write`.
///
/// # Example
///
/// ```
/// use permguard_types::Level;
///
/// assert!(Level::Write > Level::Read);
/// assert_eq!("read".parse::<Level>().ok(), Some(Level::Read));
/// assert!("admin".parse::<Level>().is_err());
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    None,
    Read,
    Write,
}

impl Level {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    #[must_use]
    pub fn is_write(self) -> bool {
        self == Self::Write
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a level string is not `none`, `read`, or `write`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid permission level '{0}' (expected none, read, or write)")]
pub struct LevelParseError(pub String);

impl FromStr for Level {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(Self::None),
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            other => Err(LevelParseError(other.to_string())),
        }
    }
}
