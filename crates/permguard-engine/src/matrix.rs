//! Cross-repository audit matrix.
//!
//! Rows are (repository, workflow, job), columns are permission kinds,
//! cells are resolved levels. Everything here is derived from the
//! [`Resolution`]; the matrix adds only formatting and ordering.

use crate::resolver::Resolution;
use permguard_types::{KindRegistry, Level, PermissionKind, Scope, ScopeNode, ScopePath};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixRow {
    pub repository: String,
    pub workflow: String,
    pub job: String,
    /// Whether some scope in the job's chain declared permissions.
    pub explicit: bool,
    pub cells: BTreeMap<PermissionKind, Level>,
}

impl MatrixRow {
    #[must_use]
    pub fn path(&self) -> ScopePath {
        ScopePath::repository(&self.repository)
            .join(&self.workflow)
            .join(&self.job)
    }

    #[must_use]
    pub fn level(&self, kind: &PermissionKind) -> Level {
        self.cells.get(kind).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditMatrix {
    pub columns: Vec<PermissionKind>,
    pub rows: Vec<MatrixRow>,
}

impl AuditMatrix {
    /// Builds the rows for one repository tree.
    #[must_use]
    pub fn build(tree: &ScopeNode, resolution: &Resolution, registry: &KindRegistry) -> Self {
        let mut rows = Vec::new();
        for workflow in tree.children.iter().filter(|n| n.scope == Scope::Workflow) {
            for job in workflow.children.iter().filter(|n| n.scope == Scope::Job) {
                let Some(resolved) = resolution.get(&job.path) else {
                    continue;
                };
                rows.push(MatrixRow {
                    repository: tree.name.clone(),
                    workflow: workflow.name.clone(),
                    job: job.name.clone(),
                    explicit: resolved.is_explicit(),
                    cells: resolved.effective.clone(),
                });
            }
        }
        Self::from_rows(rows, registry)
    }

    /// Columns are every registered kind plus any other kind a row
    /// mentions; rows are sorted by path.
    #[must_use]
    pub fn from_rows(mut rows: Vec<MatrixRow>, registry: &KindRegistry) -> Self {
        let mut columns: BTreeSet<PermissionKind> = registry.kinds().cloned().collect();
        for row in &rows {
            columns.extend(row.cells.keys().cloned());
        }
        rows.sort_by_key(MatrixRow::path);
        Self {
            columns: columns.into_iter().collect(),
            rows,
        }
    }

    #[must_use]
    pub fn merge(self, other: AuditMatrix, registry: &KindRegistry) -> Self {
        let mut rows = self.rows;
        rows.extend(other.rows);
        Self::from_rows(rows, registry)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fixed-width table: `-` none, `r` read, `W` write. Jobs running on
    /// the default token are marked with `*`.
    #[must_use]
    pub fn render_text(&self) -> String {
        let labels: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let mark = if row.explicit { "" } else { "*" };
                format!("{}{mark}", row.path())
            })
            .collect();
        let label_width = labels.iter().map(String::len).max().unwrap_or(0).max("job".len());

        let mut out = String::new();
        let _ = write!(out, "{:label_width$}", "job");
        for column in &self.columns {
            let _ = write!(out, "  {column}");
        }
        out.push('\n');

        for (row, label) in self.rows.iter().zip(&labels) {
            let _ = write!(out, "{label:label_width$}");
            for column in &self.columns {
                let width = column.as_str().len();
                let _ = write!(out, "  {:width$}", cell_code(row.level(column)));
            }
            out.push('\n');
        }
        out.push_str("\n- none  r read  W write  * no explicit declaration\n");
        out
    }

    #[must_use]
    pub fn render_csv(&self) -> String {
        let mut out = String::from("repository,workflow,job,explicit");
        for column in &self.columns {
            out.push(',');
            out.push_str(&csv_field(column.as_str()));
        }
        out.push('\n');
        for row in &self.rows {
            let _ = write!(
                out,
                "{},{},{},{}",
                csv_field(&row.repository),
                csv_field(&row.workflow),
                csv_field(&row.job),
                row.explicit
            );
            for column in &self.columns {
                out.push(',');
                out.push_str(row.level(column).as_str());
            }
            out.push('\n');
        }
        out
    }

    /// # Errors
    ///
    /// Returns the serializer error, which does not happen for matrices.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn cell_code(level: Level) -> &'static str {
    match level {
        Level::None => "-",
        Level::Read => "r",
        Level::Write => "W",
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permguard_types::Severity;

    fn registry() -> KindRegistry {
        let mut registry = KindRegistry::empty();
        registry.register("contents", Severity::Critical, "");
        registry.register("issues", Severity::Warning, "");
        registry
    }

    fn row(repo: &str, workflow: &str, job: &str, cells: &[(&str, Level)]) -> MatrixRow {
        MatrixRow {
            repository: repo.into(),
            workflow: workflow.into(),
            job: job.into(),
            explicit: true,
            cells: cells.iter().map(|(k, l)| (PermissionKind::new(k), *l)).collect(),
        }
    }

    #[test]
    fn rows_sorted_and_columns_extended() {
        let matrix = AuditMatrix::from_rows(
            vec![
                row("r2", "ci", "build", &[("contents", Level::Read)]),
                row("r1", "release", "publish", &[("packages", Level::Write)]),
            ],
            &registry(),
        );
        let cols: Vec<&str> = matrix.columns.iter().map(PermissionKind::as_str).collect();
        assert_eq!(cols, ["contents", "issues", "packages"]);
        assert_eq!(matrix.rows[0].repository, "r1");
    }

    #[test]
    fn merge_is_order_independent() {
        let reg = registry();
        let a = AuditMatrix::from_rows(vec![row("r1", "ci", "a", &[])], &reg);
        let b = AuditMatrix::from_rows(vec![row("r2", "ci", "a", &[])], &reg);
        assert_eq!(a.clone().merge(b.clone(), &reg), b.merge(a, &reg));
    }

    #[test]
    fn text_codes() {
        let mut implicit = row("r1", "ci", "test", &[("contents", Level::Write)]);
        implicit.explicit = false;
        let matrix = AuditMatrix::from_rows(
            vec![row("r1", "ci", "build", &[("contents", Level::Read)]), implicit],
            &registry(),
        );
        let text = matrix.render_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "job          contents  issues");
        assert_eq!(lines[1], "r1/ci/build  r         -     ");
        assert_eq!(lines[2], "r1/ci/test*  W         -     ");
        assert!(text.ends_with("* no explicit declaration\n"));
    }

    #[test]
    fn csv_levels() {
        let matrix = AuditMatrix::from_rows(
            vec![row("r1", "ci", "build", &[("contents", Level::Write)])],
            &registry(),
        );
        assert_eq!(
            matrix.render_csv(),
            "repository,workflow,job,explicit,contents,issues\nr1,ci,build,true,write,none\n"
        );
    }
}
