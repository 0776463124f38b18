//! Integration tests for the tash binary

mod common;

use assert_cmd::Command;
use common::create_test_config;
use predicates::prelude::*;

const CONFIG: &str = r#"
tasks:
  hello:
    description: Say hello
    args:
      - env: WHO
        description: Who to greet
        default: world
    actions:
      - cmd: {exec: "printf 'hello %s' $WHO", capture: true}
  broken:
    actions:
      - if: {value: "maybe"}
"#;

fn tash() -> Command {
    Command::cargo_bin("tash").unwrap()
}

#[test]
fn test_no_task_prints_help() {
    let (temp_dir, _) = create_test_config(CONFIG);
    tash()
        .current_dir(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("hello"))
        .stdout(predicate::str::contains("Say hello"));
}

#[test]
fn test_list_tasks() {
    let (temp_dir, _) = create_test_config(CONFIG);
    tash()
        .current_dir(temp_dir.path())
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("hello   Say hello"))
        .stdout(predicate::str::contains("broken"));
}

#[cfg(unix)]
#[test]
fn test_run_task_with_default_and_option() {
    let (temp_dir, _) = create_test_config(CONFIG);
    tash()
        .current_dir(temp_dir.path())
        .args(["-q", "hello"])
        .assert()
        .success()
        .stdout("hello world\n");

    tash()
        .current_dir(temp_dir.path())
        .args(["-q", "hello", "--WHO", "tash"])
        .assert()
        .success()
        .stdout("hello tash\n");
}

#[cfg(unix)]
#[test]
fn test_file_flag_from_other_directory() {
    let (temp_dir, config_path) = create_test_config(CONFIG);
    let elsewhere = tempfile::TempDir::new().unwrap();
    tash()
        .current_dir(elsewhere.path())
        .arg("-f")
        .arg(&config_path)
        .args(["-s", "hello"])
        .assert()
        .success()
        .stdout("");
    drop(temp_dir);
}

#[test]
fn test_task_error_exits_nonzero() {
    let (temp_dir, _) = create_test_config(CONFIG);
    tash()
        .current_dir(temp_dir.path())
        .args(["-q", "broken"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid boolean value: 'maybe'"));
}

#[test]
fn test_missing_config() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    tash()
        .current_dir(temp_dir.path())
        .arg("--list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("tash.yaml"));
}

#[test]
fn test_completions() {
    let (temp_dir, _) = create_test_config(CONFIG);
    tash()
        .current_dir(temp_dir.path())
        .args(["--completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello"));
}

#[test]
fn test_completions_without_config() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    tash()
        .current_dir(temp_dir.path())
        .args(["--completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--list"));
}
