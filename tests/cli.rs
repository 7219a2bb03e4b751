//! CLI smoke tests. None of these need a running tmux server.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn crew(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tmux-crew").unwrap();
    cmd.env("HOME", home.path())
        .env_remove("TMUX_CREW_CONFIG")
        .env_remove("RUST_LOG")
        .env_remove("TMUX");
    cmd
}

#[test]
fn setup_with_missing_path_fails() {
    let home = TempDir::new().unwrap();
    let missing = home.path().join("no-such-project");

    crew(&home)
        .args(["setup", missing.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"))
        .stderr(predicate::str::contains("does not exist"));

    assert!(!home.path().join(".tmux-crew").join("agents.json").exists());
}

#[test]
fn setup_with_file_path_fails() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("file.txt");
    fs::write(&file, "x").unwrap();

    crew(&home)
        .args(["setup", file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a directory"));
}

#[test]
fn team_size_reports_detection() {
    let home = TempDir::new().unwrap();
    let project = home.path().join("proj");
    fs::create_dir_all(project.join("src")).unwrap();
    for name in ["a.rs", "b.rs", "c.py"] {
        fs::write(project.join("src").join(name), "").unwrap();
    }
    fs::write(project.join("README.md"), "").unwrap();

    crew(&home)
        .args(["team-size", project.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("size: small"))
        .stdout(predicate::str::contains("source files: 3"))
        .stdout(predicate::str::contains("project-manager, developer"));
}

#[test]
fn team_size_uses_config_thresholds() {
    let home = TempDir::new().unwrap();
    let project = home.path().join("proj");
    fs::create_dir_all(&project).unwrap();
    for i in 0..3 {
        fs::write(project.join(format!("m{}.go", i)), "").unwrap();
    }
    let config = home.path().join("crew.yaml");
    fs::write(&config, "team:\n  small_below: 2\n  medium_below: 10\n").unwrap();

    crew(&home)
        .args(["--config", config.to_str().unwrap(), "team-size", project.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("size: medium"))
        .stdout(predicate::str::contains("project-manager, developer, qa"));
}

#[test]
fn templates_lists_builtins_and_overrides() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join(".tmux-crew").join("templates");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("designer.md"), "# Designer").unwrap();

    crew(&home)
        .arg("templates")
        .assert()
        .success()
        .stdout(predicate::str::contains("developer"))
        .stdout(predicate::str::contains("built-in"))
        .stdout(predicate::str::contains("designer.md"));
}

#[test]
fn malformed_target_is_rejected() {
    let home = TempDir::new().unwrap();
    crew(&home)
        .args(["check", "proj:"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid target"));
}

#[test]
fn empty_message_is_rejected() {
    let home = TempDir::new().unwrap();
    crew(&home)
        .args(["send", "proj:1", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("empty message"));
}

#[test]
fn missing_config_file_fails() {
    let home = TempDir::new().unwrap();
    crew(&home)
        .args(["--config", "/nonexistent/crew.yaml", "templates"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn unknown_team_size_is_usage_error() {
    let home = TempDir::new().unwrap();
    crew(&home)
        .args(["setup", ".", "--team-size", "huge"])
        .assert()
        .code(2);
}
