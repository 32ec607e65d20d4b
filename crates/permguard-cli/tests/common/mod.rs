//! Shared E2E test helpers for `permguard` binary tests.

#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for CLI tests.
pub const TIMEOUT: Duration = Duration::from_secs(10);

const PERMGUARD_VARS: &[&str] = &[
    "PERMGUARD_ORG_DEFAULT",
    "PERMGUARD_THRESHOLD",
    "PERMGUARD_ASSUME_FALLBACK",
    "PERMGUARD_FORK_APPROVAL",
    "RUST_LOG",
];

/// Command for the `permguard` binary with a clean environment, run from
/// `dir` so no stray `permguard.toml` is picked up.
pub fn permguard_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("permguard");
    cmd.timeout(TIMEOUT).current_dir(dir);
    for var in PERMGUARD_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Writes `.github/workflows/<file>` under `root/<repo>` and returns the
/// repository root.
pub fn write_workflow(root: &Path, repo: &str, file: &str, text: &str) -> PathBuf {
    let repo_root = root.join(repo);
    let dir = repo_root.join(".github/workflows");
    std::fs::create_dir_all(&dir).expect("create workflow dir");
    std::fs::write(dir.join(file), text).expect("write workflow");
    repo_root
}

pub fn write_config(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("permguard.toml");
    std::fs::write(&path, text).expect("write config");
    path
}

pub const RELEASE_PUSH: &str = r#"
on:
  push:
    branches: [main]
permissions: read-all
jobs:
  release:
    permissions:
      contents: write
      id-token: write
    steps:
      - run: make release
"#;

pub const RELEASE_FORK: &str = r#"
on: pull_request_target
permissions: read-all
jobs:
  release:
    permissions:
      contents: write
      id-token: write
    steps:
      - run: make release
"#;

pub const BASE_CONFIG: &str = r#"
[organization]
default_permissions = "read-all"

[usage."r1/workflow/release"]
contents = "write"
id-token = "write"
"#;
