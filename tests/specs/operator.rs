//! Operator transitions: abandon and recover.

use crate::prelude::TestProject;

#[test]
fn abandon_fails_a_session_with_a_synthetic_result() {
    let project = TestProject::new();
    project.init();
    let id = project.wake("core/foo", "X");

    project
        .ken()
        .args(["abandon", &id, "--reason", "went nowhere"])
        .assert()
        .success();

    assert_eq!(project.status_of(&id), "failed");
    let detail = project.stdout(&["session", &id]);
    assert!(detail.contains("abandoned by operator: went nowhere"));

    let diagnose = project.stdout(&["diagnose"]);
    assert!(diagnose.contains("failed"));
}

#[test]
fn abandon_rejects_terminal_sessions_with_exit_four() {
    let project = TestProject::new();
    project.init();
    let id = project.wake("core/foo", "X");
    project
        .ken()
        .args(["abandon", &id, "--reason", "first"])
        .assert()
        .success();

    project
        .ken()
        .args(["abandon", &id, "--reason", "second"])
        .assert()
        .code(4);
}

#[test]
fn recover_requeues_a_failed_session() {
    let project = TestProject::new();
    project.init();
    let id = project.wake("core/foo", "X");
    project
        .ken()
        .args(["abandon", &id, "--reason", "stuck"])
        .assert()
        .success();

    project.ken().args(["recover", &id]).assert().success();
    assert_eq!(project.status_of(&id), "pending");

    let log = project.stdout(&["log", &id]);
    assert!(log.contains("recover"));
}

#[test]
fn recover_rejects_non_failed_sessions_with_exit_four() {
    let project = TestProject::new();
    project.init();
    let id = project.wake("core/foo", "X");
    project.ken().args(["recover", &id]).assert().code(4);
}

#[test]
fn operator_commands_on_unknown_ids_exit_three() {
    let project = TestProject::new();
    project.init();
    project.ken().args(["recover", "ghost"]).assert().code(3);
    project
        .ken()
        .args(["abandon", "ghost", "--reason", "x"])
        .assert()
        .code(3);
}
