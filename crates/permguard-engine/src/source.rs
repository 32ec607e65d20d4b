//! Analysis input and local document discovery.
//!
//! The engine itself never fetches anything: callers build an
//! [`AnalysisInput`] from whatever source they have. For local checkouts,
//! [`load_repository`] and [`load_organization`] read
//! `.github/workflows/*.yml` and `*.yaml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Directory holding workflow definitions, relative to a repository root.
pub const WORKFLOW_DIR: &str = ".github/workflows";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),
}

/// Workflow documents of one repository, keyed by file path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryDocuments {
    pub documents: BTreeMap<String, String>,
    /// Files that were found but could not be read, with the reason.
    pub unreadable: BTreeMap<String, String>,
}

impl RepositoryDocuments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_document(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.documents.insert(path.into(), text.into());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len() + self.unreadable.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Repository identifier → documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisInput {
    pub repositories: BTreeMap<String, RepositoryDocuments>,
}

impl AnalysisInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(
        &mut self,
        repository: impl Into<String>,
        path: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.repositories
            .entry(repository.into())
            .or_default()
            .documents
            .insert(path.into(), text.into());
    }

    #[must_use]
    pub fn with_document(
        mut self,
        repository: impl Into<String>,
        path: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.add_document(repository, path, text);
        self
    }

    pub fn add_repository(&mut self, id: impl Into<String>, docs: RepositoryDocuments) {
        self.repositories.insert(id.into(), docs);
    }

    #[must_use]
    pub fn document_count(&self) -> usize {
        self.repositories.values().map(RepositoryDocuments::len).sum()
    }

    /// No documents at all, in any repository.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.document_count() == 0
    }
}

/// Reads one repository checkout. The identifier defaults to the
/// directory name.
///
/// # Errors
///
/// Returns [`SourceError`] if `root` is not a directory or the glob
/// pattern cannot be built. Unreadable workflow files are recorded in
/// [`RepositoryDocuments::unreadable`] instead.
pub fn load_repository(
    root: &Path,
    id: Option<&str>,
) -> Result<(String, RepositoryDocuments), SourceError> {
    if !root.is_dir() {
        return Err(SourceError::NotADirectory(root.to_path_buf()));
    }
    let id = id.map_or_else(|| repository_id(root), String::from);
    let mut docs = RepositoryDocuments::new();

    for path in discover_workflow_files(root)? {
        let relative = path
            .strip_prefix(root)
            .map_or_else(|_| path.clone(), Path::to_path_buf)
            .to_string_lossy()
            .replace('\\', "/");
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                docs.documents.insert(relative, text);
            }
            Err(e) => {
                warn!(repository = %id, file = %relative, error = %e, "Unreadable workflow file");
                docs.unreadable.insert(relative, e.to_string());
            }
        }
    }

    debug!(repository = %id, documents = docs.len(), "Loaded repository");
    Ok((id, docs))
}

/// Reads every immediate sub-directory of `dir` as a repository.
/// Sub-directories without a workflow directory are skipped.
///
/// # Errors
///
/// Returns [`SourceError`] if `dir` cannot be listed.
pub fn load_organization(dir: &Path) -> Result<AnalysisInput, SourceError> {
    if !dir.is_dir() {
        return Err(SourceError::NotADirectory(dir.to_path_buf()));
    }
    let entries = std::fs::read_dir(dir).map_err(|e| SourceError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut input = AnalysisInput::new();
    for entry in entries {
        let entry = entry.map_err(|e| SourceError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.join(WORKFLOW_DIR).is_dir() {
            debug!(path = %path.display(), "Skipping directory without workflows");
            continue;
        }
        let (id, docs) = load_repository(&path, None)?;
        input.add_repository(id, docs);
    }
    Ok(input)
}

fn discover_workflow_files(root: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let base = root.join(WORKFLOW_DIR);
    let mut files = Vec::new();
    for ext in ["yml", "yaml"] {
        let pattern = format!("{}/*.{ext}", glob::Pattern::escape(&base.to_string_lossy()));
        for entry in glob::glob(&pattern)? {
            let path = entry.map_err(|e| SourceError::Io {
                path: e.path().to_path_buf(),
                source: e.into_error(),
            })?;
            if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn repository_id(root: &Path) -> String {
    let canonical = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    canonical
        .file_name()
        .map_or_else(|| canonical.to_string_lossy().into_owned(), |n| n.to_string_lossy().into_owned())
}
