//! End-to-end tests for the `staging` binary, run against the in-process
//! `memory` driver so no container runtime is needed.

use std::fs;
use std::path::Path;

use assert_cmd::{Command, cargo};
use predicates::prelude::*;
use tempfile::TempDir;

fn staging(root: &Path) -> Command {
    let mut cmd = cargo::cargo_bin_cmd!("staging");
    cmd.env_clear()
        .env("NO_COLOR", "1")
        .env("MOLECULE_STAGING_DRIVER", "memory")
        .arg("-C")
        .arg(root);
    cmd
}

fn state_file(root: &Path) -> std::path::PathBuf {
    root.join(".molecule").join("staging.json")
}

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    staging(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("reconcile"));
}

#[test]
fn version_flag() {
    let dir = TempDir::new().unwrap();
    staging(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn no_color_accepts_any_non_empty_value() {
    let dir = TempDir::new().unwrap();
    for value in ["1", "yes", "true", ""] {
        staging(dir.path())
            .env("NO_COLOR", value)
            .args(["list", "--format", "list"])
            .assert()
            .success()
            .stderr(predicate::str::contains("invalid value").not());
    }
}

#[test]
fn list_on_fresh_project_is_empty() {
    let dir = TempDir::new().unwrap();
    staging(dir.path())
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
    assert!(!state_file(dir.path()).exists());
}

#[test]
fn up_list_down_lifecycle() {
    let dir = TempDir::new().unwrap();

    staging(dir.path())
        .args(["up", "Feature/Login"])
        .assert()
        .success()
        .stdout(predicate::str::contains("feature-login"));

    let raw = fs::read_to_string(state_file(dir.path())).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["version"], 1);
    let env = &doc["environments"]["feature-login"];
    assert_eq!(env["status"], "running");
    assert_eq!(env["driver"], "memory");
    assert_eq!(env["ports"]["api"], 4001);

    staging(dir.path())
        .args(["list", "--format", "list"])
        .assert()
        .success()
        .stdout("feature-login\n");

    staging(dir.path())
        .args(["health", "feature-login"])
        .assert()
        .success();

    staging(dir.path())
        .args(["down", "feature-login", "--yes"])
        .assert()
        .success();

    staging(dir.path())
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("feature-login").not());
}

#[test]
fn health_of_unknown_slug_exits_3() {
    let dir = TempDir::new().unwrap();
    staging(dir.path())
        .args(["health", "nope"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn down_of_unknown_slug_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    staging(dir.path())
        .args(["down", "ghost", "-y"])
        .assert()
        .success();
}

#[test]
fn down_without_yes_needs_a_terminal() {
    let dir = TempDir::new().unwrap();
    staging(dir.path()).args(["up", "feat-a"]).assert().success();

    staging(dir.path())
        .args(["down", "feat-a"])
        .write_stdin("y\n")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--yes"));

    // still tracked
    staging(dir.path())
        .args(["list", "--format", "list"])
        .assert()
        .stdout("feat-a\n");
}

#[test]
fn invalid_branch_exits_2() {
    let dir = TempDir::new().unwrap();
    staging(dir.path())
        .args(["up", "///"])
        .assert()
        .code(2);
}

#[test]
fn exhausted_port_range_exits_2() {
    let dir = TempDir::new().unwrap();
    let narrow = |cmd: &mut Command| {
        cmd.env("MOLECULE_STAGING_PORTS__START", "4001")
            .env("MOLECULE_STAGING_PORTS__END", "4003");
    };

    let mut first = staging(dir.path());
    narrow(&mut first);
    first.args(["up", "one"]).assert().success();

    let mut second = staging(dir.path());
    narrow(&mut second);
    second
        .args(["up", "two"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No free ports available"));
}

#[test]
fn corrupt_state_exits_4_and_is_left_alone() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(".molecule")).unwrap();
    fs::write(state_file(dir.path()), "{ not json").unwrap();

    staging(dir.path())
        .arg("list")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("corrupted"));

    assert_eq!(
        fs::read_to_string(state_file(dir.path())).unwrap(),
        "{ not json"
    );
}

#[test]
fn missing_explicit_config_exits_4() {
    let dir = TempDir::new().unwrap();
    staging(dir.path())
        .args(["--config", "does-not-exist.toml", "list"])
        .assert()
        .code(4);
}

#[test]
fn unknown_driver_is_a_configuration_error() {
    let dir = TempDir::new().unwrap();
    staging(dir.path())
        .args(["up", "feat", "--driver", "nomad"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("nomad"));
}

#[test]
fn init_writes_config_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".molecule").join("staging.toml");

    staging(dir.path()).arg("init").assert().success();
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("driver = \"memory\""));
    assert!(written.contains("[ports]"));

    fs::write(&path, "driver = \"docker-compose\"\n").unwrap();
    staging(dir.path()).arg("init").assert().success();
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "driver = \"docker-compose\"\n"
    );

    staging(dir.path()).args(["init", "--force"]).assert().success();
    assert!(fs::read_to_string(&path).unwrap().contains("memory"));
}

#[test]
fn config_path_points_into_project() {
    let dir = TempDir::new().unwrap();
    staging(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".molecule"))
        .stdout(predicate::str::contains("staging.toml"));
}

#[test]
fn completions_for_bash() {
    let dir = TempDir::new().unwrap();
    staging(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("staging"));
}

#[test]
fn reconcile_reports_records_the_driver_lost() {
    let dir = TempDir::new().unwrap();
    staging(dir.path()).args(["up", "feat-x"]).assert().success();

    // A new process gets a fresh memory driver, which knows nothing about feat-x.
    staging(dir.path())
        .args(["--output-format", "json", "reconcile"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"missing\""))
        .stdout(predicate::str::contains("feat-x"));
}
