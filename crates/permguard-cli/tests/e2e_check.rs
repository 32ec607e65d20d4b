//! E2E tests for the `permguard` binary.
//!
//! Reports go to stdout; logs and errors go to stderr.

mod common;

use common::{
    permguard_cmd, write_config, write_workflow, BASE_CONFIG, RELEASE_FORK, RELEASE_PUSH,
};
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

// ─── Gate ──────────────────────────────────────────────────────────

#[test]
fn clean_push_release_passes() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_config(tmp.path(), BASE_CONFIG);
    write_workflow(tmp.path(), "r1", "workflow.yml", RELEASE_PUSH);

    permguard_cmd(tmp.path())
        .args(["check", "r1"])
        .assert()
        .success()
        .stdout(contains("0 critical, 0 warning, 0 info, pass"))
        .stdout(contains("r1/workflow/release"));
}

#[test]
fn fork_trigger_fails_gate() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_config(tmp.path(), BASE_CONFIG);
    write_workflow(tmp.path(), "r1", "workflow.yml", RELEASE_FORK);

    permguard_cmd(tmp.path())
        .args(["check", "r1"])
        .assert()
        .code(1)
        .stdout(contains("[ForkTriggerWriteToken] r1/workflow/release"))
        .stdout(contains("fail"));
}

#[test]
fn threshold_flag_overrides_config() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_config(tmp.path(), BASE_CONFIG);
    write_workflow(
        tmp.path(),
        "r1",
        "ci.yml",
        "on: push\npermissions: read-all\njobs:\n  a:\n    steps:\n      - uses: acme/tool@v1\n",
    );

    permguard_cmd(tmp.path())
        .args(["check", "r1"])
        .assert()
        .success()
        .stdout(contains("0 critical, 1 warning"));

    permguard_cmd(tmp.path())
        .args(["check", "r1", "--threshold", "warning"])
        .assert()
        .code(1);
}

#[test]
fn env_threshold_applies() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_config(tmp.path(), BASE_CONFIG);
    write_workflow(
        tmp.path(),
        "r1",
        "ci.yml",
        "on: push\npermissions: read-all\njobs:\n  a:\n    steps:\n      - uses: acme/tool@v1\n",
    );

    permguard_cmd(tmp.path())
        .env("PERMGUARD_THRESHOLD", "warning")
        .args(["check", "r1"])
        .assert()
        .code(1);
}

// ─── Fatal errors ──────────────────────────────────────────────────

#[test]
fn missing_org_default_is_fatal() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_workflow(tmp.path(), "r1", "ci.yml", "on: push\njobs:\n  a: {runs-on: x}\n");

    permguard_cmd(tmp.path())
        .args(["check", "r1"])
        .assert()
        .code(1)
        .stdout(predicates::str::is_empty())
        .stderr(contains("organization default permissions are not configured"));
}

#[test]
fn org_default_from_flag() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_workflow(
        tmp.path(),
        "r1",
        "ci.yml",
        "on: schedule\njobs:\n  a: {runs-on: x}\n",
    );

    permguard_cmd(tmp.path())
        .args(["check", "r1", "--org-default", "contents=read"])
        .assert()
        .success()
        .stdout(contains("[ExplicitDeclarationRequired] r1/ci"));
}

#[test]
fn org_default_pair_without_level_is_fatal() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_workflow(tmp.path(), "r1", "ci.yml", RELEASE_PUSH);

    permguard_cmd(tmp.path())
        .args(["check", "r1", "--org-default", "contents=read,issues"])
        .assert()
        .code(1)
        .stdout(predicates::str::is_empty())
        .stderr(contains("organization.default_permissions"));
}

#[test]
fn bad_config_is_reported() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_config(tmp.path(), "[organization\n");
    write_workflow(tmp.path(), "r1", "ci.yml", RELEASE_PUSH);

    permguard_cmd(tmp.path())
        .args(["check", "r1"])
        .assert()
        .code(1)
        .stderr(contains("failed to load configuration"));
}

// ─── Output formats ────────────────────────────────────────────────

#[test]
fn text_output_order() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_config(tmp.path(), BASE_CONFIG);
    write_workflow(tmp.path(), "r1", "workflow.yml", RELEASE_FORK);

    let output = permguard_cmd(tmp.path())
        .args(["check", "r1"])
        .output()
        .expect("run permguard");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let findings = stdout.find("r1:").expect("findings block");
    let matrix = stdout.find("- none  r read").expect("matrix legend");
    let summary = stdout.find("1 critical").expect("summary");
    assert!(findings < matrix && matrix < summary, "{stdout}");
}

#[test]
fn csv_matrix() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_config(tmp.path(), BASE_CONFIG);
    write_workflow(tmp.path(), "r1", "workflow.yml", RELEASE_PUSH);

    permguard_cmd(tmp.path())
        .args(["check", "r1", "--format", "csv"])
        .assert()
        .success()
        .stdout(contains("repository,workflow,job,explicit,actions"))
        .stdout(contains("r1,workflow,release,true"));
}

#[test]
fn json_document() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_config(tmp.path(), BASE_CONFIG);
    write_workflow(tmp.path(), "r1", "workflow.yml", RELEASE_FORK);

    permguard_cmd(tmp.path())
        .args(["check", "r1", "--format", "json"])
        .assert()
        .code(1)
        .stdout(contains("\"summary\""))
        .stdout(contains("\"rule\": \"ForkTriggerWriteToken\""))
        .stdout(contains("\"path\": \"r1/workflow/release\""));
}

#[test]
fn matrix_format_omits_findings() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_config(tmp.path(), BASE_CONFIG);
    write_workflow(tmp.path(), "r1", "workflow.yml", RELEASE_FORK);

    permguard_cmd(tmp.path())
        .args(["check", "r1", "--format", "matrix"])
        .assert()
        .code(1)
        .stdout(contains("r1/workflow/release"))
        .stdout(contains("[ForkTriggerWriteToken]").not());
}

// ─── Organization mode ─────────────────────────────────────────────

#[test]
fn org_directory_concurrent() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_config(tmp.path(), BASE_CONFIG);
    let org = tmp.path().join("org");
    write_workflow(&org, "r1", "workflow.yml", RELEASE_PUSH);
    write_workflow(&org, "r2", "ci.yml", "on: push\npermissions: write-all\njobs:\n  a: {runs-on: x}\n");
    write_workflow(&org, "r3", "broken.yml", "on: [push\n");

    permguard_cmd(tmp.path())
        .args(["check", "--org", "org", "--concurrent"])
        .assert()
        .code(1)
        .stdout(contains("[BlanketWriteDefault] r2/ci"))
        .stdout(contains("[MalformedDocument] r3/broken"))
        .stdout(contains("r1/workflow/release"));
}

#[test]
fn repository_without_workflows_is_empty_report() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_config(tmp.path(), BASE_CONFIG);
    std::fs::create_dir_all(tmp.path().join("bare")).expect("mkdir");

    permguard_cmd(tmp.path())
        .args(["check", "bare"])
        .assert()
        .success()
        .stdout(contains("0 critical, 0 warning, 0 info, pass"))
        .stderr(contains("No workflow documents"));
}

// ─── Other subcommands ─────────────────────────────────────────────

#[test]
fn list_rules() {
    let tmp = tempfile::tempdir().expect("tempdir");
    permguard_cmd(tmp.path())
        .arg("list-rules")
        .assert()
        .success()
        .stdout(contains("ForkTriggerWriteToken"))
        .stdout(contains("LeastPrivilegeExceeded"));
}

#[test]
fn init_then_check() {
    let tmp = tempfile::tempdir().expect("tempdir");
    permguard_cmd(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stderr(contains("Created permguard.toml"));
    assert!(tmp.path().join("permguard.toml").exists());

    permguard_cmd(tmp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(contains("already exists"));

    write_workflow(tmp.path(), "r1", "workflow.yml", RELEASE_PUSH);
    permguard_cmd(tmp.path())
        .args(["check", "r1"])
        .assert()
        .success();
}
