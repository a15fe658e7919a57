use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const LITERAL_PLAN: &str = r#"{
  "planDescription": "Write a greeting",
  "steps": [
    { "step": 1, "action": "create_directory", "description": "Docs folder", "path": "docs" },
    { "step": 2, "action": "create_file", "description": "Greeting", "path": "docs/hello.txt", "content": "hello\n" }
  ]
}"#;

/// A project directory, a data directory and a plan file.
struct Env {
    project: TempDir,
    data: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            project: TempDir::new().expect("Failed to create project dir"),
            data: TempDir::new().expect("Failed to create data dir"),
        }
    }

    fn db(&self) -> String {
        self.data.path().join("history.db").display().to_string()
    }

    fn plan(&self, contents: &str) -> String {
        let path = self.data.path().join("plan.json");
        std::fs::write(&path, contents).expect("Failed to write plan");
        path.display().to_string()
    }

    fn root(&self) -> &Path {
        self.project.path()
    }
}

/// A Command with --no-color and an isolated history database.
fn waymark_cmd(env: &Env) -> Command {
    let mut cmd = Command::cargo_bin("waymark").expect("Failed to find waymark binary");
    cmd.args(["--no-color", "--database-file", &env.db()])
        .env_remove("WAYMARK_API_KEYS")
        .env("XDG_CONFIG_HOME", env.data.path());
    cmd
}

#[test]
fn test_validate_valid_plan() {
    let env = Env::new();
    let plan = env.plan(LITERAL_PLAN);

    waymark_cmd(&env)
        .args(["validate", &plan])
        .assert()
        .success()
        .stdout(predicate::str::contains("Plan is valid: 2 step(s)."))
        .stdout(predicate::str::contains("**create_directory** Docs folder (`docs`)"));
}

#[test]
fn test_validate_invalid_plan() {
    let env = Env::new();
    let plan = env.plan(
        r#"{"planDescription": "Bad", "steps": [
            {"step": 1, "action": "create_file", "description": "Escape", "path": "../x", "content": "x"}
        ]}"#,
    );

    waymark_cmd(&env)
        .args(["validate", &plan])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Error: Invalid plan"))
        .stdout(predicate::str::contains("'..'"));
}

#[test]
fn test_validate_from_stdin() {
    let env = Env::new();

    waymark_cmd(&env)
        .args(["validate", "-"])
        .write_stdin(LITERAL_PLAN)
        .assert()
        .success()
        .stdout(predicate::str::contains("# Write a greeting"));
}

#[test]
fn test_history_empty() {
    let env = Env::new();

    waymark_cmd(&env)
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No change sets recorded."));
}

#[test]
fn test_run_literal_plan_then_history_and_revert() {
    let env = Env::new();
    let plan = env.plan(LITERAL_PLAN);
    let root = env.root().display().to_string();

    waymark_cmd(&env)
        .args(["run", &plan, "--root", &root])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Success"))
        .stdout(predicate::str::contains("**Steps completed**: 2 of 2"))
        .stdout(predicate::str::contains("**Change set**: 1"));
    assert_eq!(
        std::fs::read_to_string(env.root().join("docs/hello.txt")).unwrap(),
        "hello\n"
    );

    waymark_cmd(&env)
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- **1**: ✓ Success Write a greeting (2 changes)"));

    waymark_cmd(&env)
        .args(["history", "show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Change set 1"))
        .stdout(predicate::str::contains("+hello"));

    waymark_cmd(&env)
        .args(["history", "revert", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reverted 1 path(s) from change set 1."))
        .stdout(predicate::str::contains("directories are left in place"));
    assert!(!env.root().join("docs/hello.txt").exists());

    waymark_cmd(&env)
        .args(["history", "revert", "1"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("already reverted"));
}

#[test]
fn test_run_command_with_yes() {
    let env = Env::new();
    let plan = env.plan(
        r#"{"planDescription": "Touch", "steps": [
            {"step": 1, "action": "run_command", "description": "Make marker", "command": "touch marker"}
        ]}"#,
    );
    let root = env.root().display().to_string();

    waymark_cmd(&env)
        .args(["run", &plan, "--root", &root, "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("command exited with code 0"));
    assert!(env.root().join("marker").exists());
}

#[test]
fn test_run_command_declined_at_eof() {
    let env = Env::new();
    let plan = env.plan(
        r#"{"planDescription": "Touch", "steps": [
            {"step": 1, "action": "run_command", "description": "Make marker", "command": "touch marker"}
        ]}"#,
    );
    let root = env.root().display().to_string();

    waymark_cmd(&env)
        .args(["run", &plan, "--root", &root])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped by user"));
    assert!(!env.root().join("marker").exists());
}

#[test]
fn test_history_show_missing() {
    let env = Env::new();

    waymark_cmd(&env)
        .args(["history", "show", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Change set 42 not found"));
}
