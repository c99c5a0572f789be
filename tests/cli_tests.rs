mod common;

use common::*;
use std::process::Command;

fn cli_command() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_yematch"));
    cmd.env_remove("YEMATCH_READY_HOST")
        .env_remove("YEMATCH_SMART_URL")
        .env_remove("YEMATCH_SMART_TOKEN");
    cmd
}

#[test]
fn test_cli_help() {
    let output = cli_command().arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Drive READY and SMART through year-end runs"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("list"));
    assert!(stdout.contains("activities"));
    assert!(stdout.contains("validate"));
    assert!(stdout.contains("golden-map"));
}

#[test]
fn test_cli_version() {
    let output = cli_command().arg("--version").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("yematch"));
}

#[test]
fn test_cli_run_help() {
    let output = cli_command().args(["run", "--help"]).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Execute a run definition"));
    assert!(stdout.contains("--from"));
}

#[test]
fn test_cli_list_builtin() {
    let dir = create_test_dir();
    let output = cli_command()
        .current_dir(dir.path())
        .arg("list")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ready-year-end"));
    assert!(stdout.contains("golden [golden]"));
    assert!(stdout.contains("termination [reseed]"));
    assert!(stdout.contains("P00 P01 P02"));
}

#[test]
fn test_cli_list_includes_loaded_definitions() {
    let dir = create_test_dir();
    write_definition(dir.path(), "mine.yaml", "name: mine\nactivities: [R01, S01]\n");

    let output = cli_command()
        .current_dir(dir.path())
        .args(["list", "--definitions", "."])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("R01 S01"));
}

#[test]
fn test_cli_activities() {
    let dir = create_test_dir();
    let output = cli_command()
        .current_dir(dir.path())
        .arg("activities")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("R00"));
    assert!(stdout.contains("S24B"));
    assert!(stdout.contains("EJR "));
    assert!(stdout.contains("R13A + S13A"));
}

#[test]
fn test_cli_validate() {
    let dir = create_test_dir();
    write_definition(dir.path(), "good.yaml", "name: good\nactivities: [R03, S03]\n");

    let output = cli_command()
        .current_dir(dir.path())
        .args(["validate", "good.yaml"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("✓ good (2 activities)"));

    write_definition(dir.path(), "bad.yaml", "name: bad\nactivities: [R77]\n");
    let output = cli_command()
        .current_dir(dir.path())
        .args(["validate", "bad.yaml"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_golden_map() {
    let dir = create_test_dir();
    let output = cli_command()
        .current_dir(dir.path())
        .args(["golden-map", "R25", "--id", "123456"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("PROF130-123456 -> R25-PROF130"));
    assert!(stdout.contains("PROF130Y-123456 -> R25-PROF130Y"));
}

#[test]
fn test_cli_run_unknown_definition() {
    let dir = create_test_dir();
    let output = cli_command()
        .current_dir(dir.path())
        .args(["run", "no-such-run"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown run definition"));
}

#[test]
fn test_cli_run_without_ready_host_fails_before_starting() {
    let dir = create_test_dir();
    let output = cli_command()
        .current_dir(dir.path())
        .args(["run", "termination"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(!dir.path().join("data").exists());
}
