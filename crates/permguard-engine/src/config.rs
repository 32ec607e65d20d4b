//! `permguard.toml` configuration.
//!
//! # Load Order
//!
//! 1. Default values
//! 2. Config file (`permguard.toml`)
//! 3. Usage hint file (`--usage`), merged into `[usage]`
//! 4. Environment variables (`PERMGUARD_*`)
//!
//! CLI flags are applied on top by the binary. Each layer overrides the
//! previous one.
//!
//! # Example
//!
//! ```toml
//! [organization]
//! default_permissions = "read-all"
//! assume_platform_fallback = true
//! fork_approval_required = true
//!
//! [fallback]
//! push = "write-all"
//!
//! [repositories.legacy-service]
//! default_permissions = { contents = "read", packages = "write" }
//!
//! [kinds.artifact-metadata]
//! unused_write = "warning"
//!
//! [usage."legacy-service/release/publish"]
//! contents = "write"
//! id-token = "write"
//!
//! [rules.UnpinnedAction]
//! trusted_owners = ["actions", "github", "my-org"]
//!
//! [gate]
//! threshold = "critical"
//! ```

use permguard_types::{PermissionBlockError, RawPermissions, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "permguard.toml";

macro_rules! parse_env_bool {
    ($field:expr, $var:literal) => {
        if let Ok(val) = std::env::var($var) {
            $field = parse_bool(&val)
                .ok_or_else(|| ConfigError::invalid_env_var($var, "expected bool"))?;
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub organization: OrganizationConfig,

    /// Trigger name → assumed permissions when nothing is declared.
    /// Merged over the built-in fallback table.
    #[serde(default)]
    pub fallback: BTreeMap<String, PermissionSpec>,

    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryConfig>,

    #[serde(default)]
    pub kinds: BTreeMap<String, KindConfig>,

    /// Scope-path glob → kind → required level.
    #[serde(default)]
    pub usage: BTreeMap<String, BTreeMap<String, String>>,

    #[serde(default)]
    pub rules: BTreeMap<String, RuleConfig>,

    #[serde(default)]
    pub gate: GateConfig,
}

impl Config {
    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content).map_err(|e| e.with_path(path))
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML or schema mismatch.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    #[must_use]
    pub fn is_rule_enabled(&self, rule_name: &str) -> bool {
        self.rules
            .get(rule_name)
            .map_or(true, |c| c.enabled.unwrap_or(true))
    }

    #[must_use]
    pub fn rule_severity(&self, rule_name: &str) -> Option<Severity> {
        self.rules.get(rule_name).and_then(|c| c.severity)
    }

    /// Merges usage hints from a standalone file shaped like the
    /// `[usage]` table. Later entries win per kind.
    pub fn merge_usage(&mut self, usage: UsageFile) {
        for (pattern, kinds) in usage.usage {
            self.usage.entry(pattern).or_default().extend(kinds);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationConfig {
    /// Baseline token permissions. Resolution cannot run without it.
    #[serde(default)]
    pub default_permissions: Option<PermissionSpec>,

    /// Treat undeclared chains as the platform's fallback for the trigger
    /// rather than the organization default.
    #[serde(default = "default_true")]
    pub assume_platform_fallback: bool,

    /// Whether workflows from fork pull requests need maintainer approval
    /// before they run.
    #[serde(default = "default_true")]
    pub fork_approval_required: bool,
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        Self {
            default_permissions: None,
            assume_platform_fallback: true,
            fork_approval_required: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub default_permissions: Option<PermissionSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindConfig {
    #[serde(default)]
    pub unused_write: Option<Severity>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub enabled: Option<bool>,

    #[serde(default)]
    pub severity: Option<Severity>,

    #[serde(flatten)]
    pub options: BTreeMap<String, toml::Value>,
}

impl RuleConfig {
    /// String array option; non-string elements are ignored.
    #[must_use]
    pub fn get_string_list(&self, key: &str) -> Option<Vec<String>> {
        self.options.get(key).and_then(toml::Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(toml::Value::as_str)
                .map(String::from)
                .collect()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Findings at or above this severity fail the run.
    #[serde(default = "default_threshold")]
    pub threshold: Severity,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

fn default_threshold() -> Severity {
    Severity::Critical
}

/// A permission declaration in config: `"read-all"` or `{ contents = "read" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionSpec {
    Blanket(String),
    Mapped(BTreeMap<String, String>),
}

impl PermissionSpec {
    #[must_use]
    pub fn to_raw(&self) -> RawPermissions {
        match self {
            Self::Blanket(s) => RawPermissions::Blanket(s.clone()),
            Self::Mapped(map) => RawPermissions::Mapped(
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ),
        }
    }

    /// Parses the compact env/CLI form: `read-all`, `write-all`, or
    /// `contents=read,issues=write`. An empty string means `{}`. A pair
    /// without `=` keeps an empty level so validation rejects it.
    #[must_use]
    pub fn from_compact(s: &str) -> Self {
        let s = s.trim();
        if !s.contains('=') && !s.is_empty() {
            return Self::Blanket(s.to_string());
        }
        Self::Mapped(
            s.split(',')
                .map(str::trim)
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                    (k.trim().to_string(), v.trim().to_string())
                })
                .collect(),
        )
    }
}

/// Standalone usage hint file (`--usage hints.toml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageFile {
    #[serde(default)]
    pub usage: BTreeMap<String, BTreeMap<String, String>>,
}

impl UsageFile {
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            message: format!("{}: {e}", path.display()),
        })
    }
}

/// Layered config loader.
///
/// # Example
///
/// ```no_run
/// use permguard_engine::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_file("permguard.toml")
///     .skip_env_vars()
///     .load()?;
/// # Ok::<(), permguard_engine::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    usage_file: Option<PathBuf>,
    require_file: bool,
    skip_env: bool,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Config file to load. A missing file is skipped.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Fails instead of skipping when the config file does not exist.
    #[must_use]
    pub fn require_file(mut self) -> Self {
        self.require_file = true;
        self
    }

    #[must_use]
    pub fn with_usage_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.usage_file = Some(path.into());
        self
    }

    /// Useful for testing with deterministic config.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] if a file exists but cannot be parsed, a
    /// required file is missing, or an environment variable is invalid.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = self.file {
            if path.exists() {
                config = Config::from_file(path)?;
                debug!(path = %path.display(), "Loaded config file");
            } else if self.require_file {
                return Err(ConfigError::Io {
                    path: path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                });
            } else {
                debug!(path = %path.display(), "Config file not found, using defaults");
            }
        }

        if let Some(ref path) = self.usage_file {
            let usage = UsageFile::from_file(path)?;
            debug!(path = %path.display(), patterns = usage.usage.len(), "Loaded usage hints");
            config.merge_usage(usage);
        }

        if !self.skip_env {
            apply_env_vars(&mut config)?;
        }

        Ok(config)
    }
}

fn apply_env_vars(config: &mut Config) -> Result<(), ConfigError> {
    parse_env_bool!(
        config.organization.assume_platform_fallback,
        "PERMGUARD_ASSUME_FALLBACK"
    );
    parse_env_bool!(
        config.organization.fork_approval_required,
        "PERMGUARD_FORK_APPROVAL"
    );

    if let Ok(val) = std::env::var("PERMGUARD_ORG_DEFAULT") {
        config.organization.default_permissions = Some(PermissionSpec::from_compact(&val));
    }

    if let Ok(val) = std::env::var("PERMGUARD_THRESHOLD") {
        config.gate.threshold = val
            .parse()
            .map_err(|e: permguard_types::SeverityParseError| {
                ConfigError::invalid_env_var("PERMGUARD_THRESHOLD", e.to_string())
            })?;
    }

    Ok(())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {message}")]
    Parse { message: String },

    #[error("invalid permissions in {field}: {source}")]
    InvalidPermissions {
        field: String,
        #[source]
        source: PermissionBlockError,
    },

    #[error("unknown permission kind '{kind}' in {field}")]
    UnknownKind { field: String, kind: String },

    #[error("invalid level '{level}' for '{kind}' in {field}")]
    InvalidLevel {
        field: String,
        kind: String,
        level: String,
    },

    #[error("invalid scope pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("invalid value for environment variable '{name}': {message}")]
    InvalidEnvVar { name: String, message: String },
}

impl ConfigError {
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    fn with_path(self, path: &Path) -> Self {
        match self {
            Self::Parse { message } => Self::Parse {
                message: format!("{}: {message}", path.display()),
            },
            other => other,
        }
    }
}
