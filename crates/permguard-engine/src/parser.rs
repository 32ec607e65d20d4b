//! Workflow document parser.
//!
//! Turns raw workflow YAML into a [`ScopeNode`] tree per repository.
//! Missing `permissions:` blocks stay `None`; defaults are the resolver's
//! business. Anything malformed is attached to the node it belongs to as a
//! [`ParseIssue`] and parsing carries on with the rest of the document and
//! the rest of the repository.

use crate::source::RepositoryDocuments;
use permguard_types::{
    ActionRef, KindRegistry, ParseIssue, PermissionBlockError, PermissionSet, RawPermissions,
    Scope, ScopeNode, ScopePath, TriggerKind,
};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

pub struct WorkflowParser<'a> {
    registry: &'a KindRegistry,
}

impl<'a> WorkflowParser<'a> {
    #[must_use]
    pub fn new(registry: &'a KindRegistry) -> Self {
        Self { registry }
    }

    /// Builds the tree for one repository. `repository_override` becomes
    /// the repository node's declaration.
    #[must_use]
    pub fn parse_repository(
        &self,
        id: &str,
        docs: &RepositoryDocuments,
        repository_override: Option<&PermissionSet>,
    ) -> ScopeNode {
        let repo_path = ScopePath::repository(id);
        let mut repo = ScopeNode::new(Scope::Repository, repo_path.clone());
        repo.declared = repository_override.cloned();

        let mut used_names = BTreeSet::new();
        let mut files: Vec<(&String, Option<&String>)> = docs
            .documents
            .iter()
            .map(|(file, text)| (file, Some(text)))
            .chain(docs.unreadable.keys().map(|file| (file, None)))
            .collect();
        files.sort_by(|a, b| a.0.cmp(b.0));

        for (file, text) in files {
            let name = workflow_name(file, &used_names);
            used_names.insert(name.clone());
            let workflow = match text {
                Some(text) => self.parse_workflow(&repo_path, &name, file, text),
                None => {
                    let path = repo_path.join(&name);
                    let reason = docs
                        .unreadable
                        .get(file)
                        .map_or_else(String::new, |r| format!("unreadable: {r}"));
                    let mut node = ScopeNode::new(Scope::Workflow, path.clone());
                    node.source = Some(file.clone());
                    node.issues.push(ParseIssue::MalformedDocument { path, reason });
                    node
                }
            };
            repo.children.push(workflow);
        }

        debug!(
            repository = %id,
            workflows = repo.children.len(),
            declarations = repo.declaration_count(),
            "Parsed repository"
        );
        repo
    }

    /// Parses a single workflow document into a workflow node named `name`.
    #[must_use]
    pub fn parse_workflow(
        &self,
        repo_path: &ScopePath,
        name: &str,
        file: &str,
        text: &str,
    ) -> ScopeNode {
        let path = repo_path.join(name);
        let mut node = ScopeNode::new(Scope::Workflow, path.clone());
        node.source = Some(file.to_string());

        let doc: Value = match serde_yaml::from_str(text) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(file, error = %e, "Workflow is not valid YAML");
                node.issues.push(ParseIssue::MalformedDocument {
                    path,
                    reason: e.to_string(),
                });
                return node;
            }
        };
        let Some(map) = doc.as_mapping() else {
            node.issues.push(ParseIssue::MalformedDocument {
                path,
                reason: format!("expected a mapping at top level, found {}", shape(&doc)),
            });
            return node;
        };

        node.display_name = get(map, "name").and_then(Value::as_str).map(String::from);

        match trigger_value(map) {
            Some(on) => node.triggers = parse_triggers(on),
            None => node.issues.push(ParseIssue::MalformedDocument {
                path: path.clone(),
                reason: "no 'on:' triggers declared".to_string(),
            }),
        }

        if let Some(value) = get(map, "permissions") {
            node.declared = self.parse_permissions(value, &path, &mut node.issues);
        }

        match get(map, "jobs") {
            Some(Value::Mapping(jobs)) => {
                for (key, job) in jobs {
                    let Some(job_id) = key_str(key) else {
                        node.issues.push(ParseIssue::MalformedDocument {
                            path: path.clone(),
                            reason: format!("job key must be a string, found {}", shape(key)),
                        });
                        continue;
                    };
                    node.children.push(self.parse_job(&path, &job_id, job));
                }
            }
            Some(other) => node.issues.push(ParseIssue::MalformedDocument {
                path: path.clone(),
                reason: format!("'jobs' must be a mapping, found {}", shape(other)),
            }),
            None => node.issues.push(ParseIssue::MalformedDocument {
                path: path.clone(),
                reason: "no 'jobs:' declared".to_string(),
            }),
        }

        node
    }

    fn parse_job(&self, workflow_path: &ScopePath, job_id: &str, value: &Value) -> ScopeNode {
        let path = workflow_path.join(job_id);
        let mut node = ScopeNode::new(Scope::Job, path.clone());

        let Some(map) = value.as_mapping() else {
            node.issues.push(ParseIssue::MalformedDocument {
                path,
                reason: format!("job must be a mapping, found {}", shape(value)),
            });
            return node;
        };

        node.display_name = get(map, "name").and_then(Value::as_str).map(String::from);
        node.uses = get(map, "uses").and_then(Value::as_str).map(ActionRef::parse);

        if let Some(value) = get(map, "permissions") {
            node.declared = self.parse_permissions(value, &path, &mut node.issues);
        }

        if let Some(Value::Sequence(steps)) = get(map, "steps") {
            for (index, step) in steps.iter().enumerate() {
                node.children.push(parse_step(&path, index, step));
            }
        }

        node
    }

    fn parse_permissions(
        &self,
        value: &Value,
        path: &ScopePath,
        issues: &mut Vec<ParseIssue>,
    ) -> Option<PermissionSet> {
        let raw = match raw_permissions(value) {
            Ok(raw) => raw,
            Err(e) => {
                issues.push(ParseIssue::malformed_block(path.clone(), &e));
                return None;
            }
        };
        match PermissionSet::from_raw(&raw, self.registry) {
            Ok(parsed) => {
                for kind in parsed.unknown_kinds {
                    issues.push(ParseIssue::UnknownPermissionKind {
                        path: path.clone(),
                        kind,
                    });
                }
                Some(parsed.set)
            }
            Err(e) => {
                issues.push(ParseIssue::malformed_block(path.clone(), &e));
                None
            }
        }
    }
}

fn parse_step(job_path: &ScopePath, index: usize, value: &Value) -> ScopeNode {
    let map = value.as_mapping();
    let id = map
        .and_then(|m| get(m, "id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty() && !id.contains('/'))
        .map_or_else(|| format!("step-{}", index + 1), String::from);
    let path = job_path.join(id);
    let mut node = ScopeNode::new(Scope::Step, path.clone());

    let Some(map) = map else {
        node.issues.push(ParseIssue::MalformedDocument {
            path,
            reason: format!("step must be a mapping, found {}", shape(value)),
        });
        return node;
    };

    node.display_name = get(map, "name").and_then(Value::as_str).map(String::from);
    node.uses = get(map, "uses").and_then(Value::as_str).map(ActionRef::parse);

    if get(map, "permissions").is_some() {
        node.issues.push(ParseIssue::MalformedPermissionBlock {
            path,
            field: "permissions".to_string(),
            reason: "permissions cannot be declared on a step; declare them on the job"
                .to_string(),
        });
    }

    node
}

/// `.github/workflows/release.yml` → `release`. Falls back to the file
/// name when the stem is already taken (`ci.yml` next to `ci.yaml`).
fn workflow_name(file: &str, used: &BTreeSet<String>) -> String {
    let path = Path::new(file);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string());
    if !used.contains(&stem) {
        return stem;
    }
    path.file_name()
        .map_or_else(|| file.to_string(), |s| s.to_string_lossy().into_owned())
}

fn raw_permissions(value: &Value) -> Result<RawPermissions, PermissionBlockError> {
    match value {
        Value::String(s) => Ok(RawPermissions::Blanket(s.clone())),
        Value::Mapping(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, level) in map {
                let key = key_str(key)
                    .ok_or_else(|| PermissionBlockError::WrongShape(format!("{} key", shape(key))))?;
                entries.push((key, scalar_string(level)));
            }
            Ok(RawPermissions::Mapped(entries))
        }
        other => Err(PermissionBlockError::WrongShape(shape(other).to_string())),
    }
}

fn parse_triggers(on: &Value) -> Vec<TriggerKind> {
    let names: Vec<String> = match on {
        Value::String(s) => vec![s.clone()],
        Value::Sequence(items) => items.iter().filter_map(key_str).collect(),
        Value::Mapping(map) => map.keys().filter_map(key_str).collect(),
        _ => Vec::new(),
    };
    let mut triggers: Vec<TriggerKind> = names.iter().map(|n| TriggerKind::parse(n)).collect();
    triggers.sort();
    triggers.dedup();
    triggers
}

// YAML 1.1 readers turn a bare `on` key into boolean `true`.
fn trigger_value(map: &Mapping) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| k.as_str() == Some("on") || matches!(k, Value::Bool(true)))
        .map(|(_, v)| v)
}

fn get<'m>(map: &'m Mapping, key: &str) -> Option<&'m Value> {
    map.iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

fn key_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => shape(other).to_string(),
    }
}

fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permguard_types::Level;

    fn parse(text: &str) -> ScopeNode {
        let registry = KindRegistry::builtin();
        WorkflowParser::new(&registry).parse_workflow(
            &ScopePath::repository("r1"),
            "ci",
            ".github/workflows/ci.yml",
            text,
        )
    }

    #[test]
    fn workflow_and_job_blocks() {
        let wf = parse(
            r#"
name: CI
on:
  push:
    branches: [main]
  pull_request:
permissions: read-all
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - id: test
        run: cargo test
  release:
    permissions:
      contents: write
      id-token: write
    runs-on: ubuntu-latest
"#,
        );
        assert!(wf.issues.is_empty(), "{:?}", wf.issues);
        assert_eq!(wf.display_name.as_deref(), Some("CI"));
        assert_eq!(wf.triggers, [TriggerKind::Push, TriggerKind::PullRequest]);
        assert_eq!(wf.declared, Some(PermissionSet::ReadAll));

        let build = wf.child("build").expect("build job");
        assert_eq!(build.declared, None);
        let steps: Vec<&str> = build.children.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(steps, ["step-1", "test"]);
        assert_eq!(
            build.children[0].uses.as_ref().map(|u| u.raw.as_str()),
            Some("actions/checkout@v4")
        );

        let release = wf.child("release").expect("release job");
        assert_eq!(
            release.declared,
            Some(PermissionSet::explicit([
                ("contents", Level::Write),
                ("id-token", Level::Write)
            ]))
        );
        assert_eq!(release.path.to_string(), "r1/ci/release");
    }

    #[test]
    fn missing_permissions_stay_none() {
        let wf = parse("on: push\njobs:\n  build:\n    runs-on: x\n");
        assert_eq!(wf.declared, None);
        assert_eq!(wf.child("build").and_then(|j| j.declared.clone()), None);
        assert_eq!(wf.declaration_count(), 0);
    }

    #[test]
    fn empty_mapping_means_none_everywhere() {
        let wf = parse("on: push\npermissions: {}\njobs: {}\n");
        assert_eq!(wf.declared, Some(PermissionSet::empty()));
    }

    #[test]
    fn trigger_forms() {
        assert_eq!(parse("on: push\njobs: {}").triggers, [TriggerKind::Push]);
        assert_eq!(
            parse("on: [pull_request_target, push, push]\njobs: {}").triggers,
            [TriggerKind::Push, TriggerKind::PullRequestTarget]
        );
        assert_eq!(
            parse("on:\n  schedule:\n    - cron: '0 0 * * *'\n  workflow_dispatch:\njobs: {}")
                .triggers,
            [TriggerKind::WorkflowDispatch, TriggerKind::Schedule]
        );
    }

    #[test]
    fn malformed_level_is_attached_and_inherits() {
        let wf = parse(
            "on: push\njobs:\n  build:\n    permissions:\n      contents: admin\n  test:\n    permissions: read-all\n",
        );
        let build = wf.child("build").expect("build");
        assert_eq!(build.declared, None);
        assert!(matches!(
            build.issues.as_slice(),
            [ParseIssue::MalformedPermissionBlock { field, .. }] if field == "contents"
        ));
        // sibling unaffected
        assert_eq!(
            wf.child("test").and_then(|j| j.declared.clone()),
            Some(PermissionSet::ReadAll)
        );
    }

    #[test]
    fn blanket_and_mapped_is_malformed() {
        let wf = parse("on: push\npermissions:\n  read-all: true\n  contents: write\njobs: {}\n");
        assert_eq!(wf.declared, None);
        assert_eq!(wf.issues.len(), 1);
        assert_eq!(wf.issues[0].code(), "MalformedPermissionBlock");
    }

    #[test]
    fn unknown_kind_keeps_rest_of_block() {
        let wf = parse("on: push\npermissions:\n  contents: read\n  telepathy: write\njobs: {}\n");
        assert_eq!(
            wf.declared,
            Some(PermissionSet::explicit([("contents", Level::Read)]))
        );
        assert!(matches!(
            wf.issues.as_slice(),
            [ParseIssue::UnknownPermissionKind { kind, .. }] if kind == "telepathy"
        ));
    }

    #[test]
    fn invalid_yaml_degrades_to_issue() {
        let wf = parse("on: [push\njobs:");
        assert!(wf.children.is_empty());
        assert_eq!(wf.issues.len(), 1);
        assert_eq!(wf.issues[0].code(), "MalformedDocument");
    }

    #[test]
    fn step_permissions_reported() {
        let wf = parse(
            "on: push\njobs:\n  build:\n    steps:\n      - run: echo\n        permissions: write-all\n",
        );
        let step = wf.find(&["build", "step-1"]).expect("step");
        assert_eq!(step.declared, None);
        assert_eq!(step.issues[0].code(), "MalformedPermissionBlock");
    }

    #[test]
    fn reusable_workflow_job() {
        let wf = parse("on: push\njobs:\n  call:\n    uses: acme/shared/.github/workflows/ci.yml@main\n");
        let job = wf.child("call").expect("job");
        assert_eq!(job.uses.as_ref().and_then(|u| u.owner()), Some("acme"));
    }

    #[test]
    fn repository_tree_is_deterministic() {
        let registry = KindRegistry::builtin();
        let parser = WorkflowParser::new(&registry);
        let docs = RepositoryDocuments::new()
            .with_document(".github/workflows/b.yml", "on: push\njobs: {}\n")
            .with_document(".github/workflows/a.yml", "on: push\npermissions: read-all\njobs: {}\n")
            .with_document(".github/workflows/a.yaml", "on: push\njobs: {}\n");
        let first = parser.parse_repository("r1", &docs, None);
        let second = parser.parse_repository("r1", &docs, None);
        assert_eq!(first, second);
        let names: Vec<&str> = first.children.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, ["a", "a.yml", "b"]);
    }

    #[test]
    fn unreadable_file_becomes_document_issue() {
        let registry = KindRegistry::builtin();
        let mut docs = RepositoryDocuments::new();
        docs.unreadable
            .insert(".github/workflows/x.yml".into(), "permission denied".into());
        let repo = WorkflowParser::new(&registry).parse_repository("r1", &docs, None);
        let wf = repo.child("x").expect("workflow node");
        assert!(wf.issues[0].to_string().contains("permission denied"));
    }

    #[test]
    fn repository_override_is_declared_on_root() {
        let registry = KindRegistry::builtin();
        let repo = WorkflowParser::new(&registry).parse_repository(
            "r1",
            &RepositoryDocuments::new(),
            Some(&PermissionSet::ReadAll),
        );
        assert_eq!(repo.declared, Some(PermissionSet::ReadAll));
        assert_eq!(repo.scope, Scope::Repository);
    }
}
