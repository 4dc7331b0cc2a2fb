//! General CLI behavior: help, exit codes, prefix lookup.

use crate::prelude::TestProject;
use assert_cmd::Command;

#[test]
fn help_names_the_core_commands() {
    let output = Command::cargo_bin("ken")
        .unwrap()
        .arg("--help")
        .assert()
        .success();
    let text = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    for command in [
        "init", "wake", "process", "daemon", "status", "tree", "session", "why", "log",
        "diagnose", "recover", "abandon", "request",
    ] {
        assert!(text.contains(command), "help missing {command}");
    }
}

#[test]
fn unknown_session_queries_exit_three() {
    let project = TestProject::new();
    project.init();
    project.ken().args(["session", "ghost"]).assert().code(3);
    project.ken().args(["tree", "ghost"]).assert().code(3);
    project.ken().args(["why", "ghost"]).assert().code(3);
    project.ken().args(["log", "ghost"]).assert().code(3);
}

#[test]
fn session_lookup_accepts_unique_prefixes() {
    let project = TestProject::new();
    project.init();
    let id = project.wake("core/foo", "X");
    let prefix = &id[..8];

    let detail = project.stdout(&["session", prefix]);
    assert!(detail.contains(&id));
}

#[test]
fn invalid_ken_paths_are_rejected() {
    let project = TestProject::new();
    project.init();
    project
        .ken()
        .args(["wake", "Not/A/Valid Path", "--task", "X"])
        .assert()
        .code(1);
}
