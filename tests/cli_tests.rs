/// End-to-end tests for the acuhelper binary
/// Only commands that need no network, registry or elevated host are run

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn acuhelper(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("acuhelper").unwrap();
    cmd.env("ACUHELPER_CONFIG", config_dir.path().join("config.json"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_command_groups() {
    let dir = TempDir::new().unwrap();
    acuhelper(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("version"))
        .stdout(predicate::str::contains("site"))
        .stdout(predicate::str::contains("patch"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_invalid_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    acuhelper(&dir)
        .args(["version", "install", "24.1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Version '24.1' is invalid"));
}

#[test]
fn test_config_set_then_get() {
    let dir = TempDir::new().unwrap();
    acuhelper(&dir)
        .args(["config", "set", "AcumaticaVersionDir", "Builds"])
        .assert()
        .success();

    acuhelper(&dir)
        .args(["config", "get", "acumaticaversiondir"])
        .assert()
        .success()
        .stdout("Builds\n");

    let saved = std::fs::read_to_string(dir.path().join("config.json")).unwrap();
    assert!(saved.contains("\"AcumaticaVersionDir\": \"Builds\""));
}

#[test]
fn test_config_unknown_key_fails() {
    let dir = TempDir::new().unwrap();
    acuhelper(&dir)
        .args(["config", "get", "Colour"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key: Colour"));
}

#[test]
fn test_version_list_on_empty_root() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("acumatica");
    acuhelper(&dir)
        .args(["config", "set", "AcumaticaDir"])
        .arg(&root)
        .assert()
        .success();

    acuhelper(&dir)
        .args(["version", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No versions installed"));
}

#[test]
fn test_patch_tool_below_gate() {
    let dir = TempDir::new().unwrap();
    acuhelper(&dir)
        .args(["patch", "tool", "24.200.0123"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("not available"));
}
