//! `ken wake` and the read-only views over fresh sessions.

use crate::prelude::TestProject;

#[test]
fn wake_prints_the_new_session_id() {
    let project = TestProject::new();
    project.init();
    let id = project.wake("core/foo", "ship the feature");
    assert!(!id.is_empty());

    assert_eq!(project.status_of(&id), "pending");
    let detail = project.stdout(&["session", &id]);
    assert!(detail.contains("ship the feature"));
    assert!(detail.contains("ken:       core/foo"));
}

#[test]
fn wake_accepts_a_done_when_file() {
    let project = TestProject::new();
    project.init();
    std::fs::write(
        project.root().join("done.json"),
        r#"{"description":"all green","criteria":["tests pass","docs updated"],"verify":"cargo test"}"#,
    )
    .unwrap();

    let id = project.stdout(&[
        "wake",
        "core/foo",
        "--task",
        "X",
        "--done-when",
        "done.json",
    ]);
    let detail = project.stdout(&["session", id.trim()]);
    assert!(detail.contains("done when: all green"));
    assert!(detail.contains("- tests pass"));
    assert!(detail.contains("verify: cargo test"));
}

#[test]
fn wake_accepts_a_toml_done_when_file() {
    let project = TestProject::new();
    project.init();
    std::fs::write(
        project.root().join("done.toml"),
        "description = \"all green\"\ncriteria = [\"tests pass\"]\n",
    )
    .unwrap();

    let id = project.stdout(&[
        "wake",
        "core/foo",
        "--task",
        "X",
        "--done-when",
        "done.toml",
    ]);
    let detail = project.stdout(&["session", id.trim()]);
    assert!(detail.contains("done when: all green"));
}

#[test]
fn status_and_tree_report_the_new_root() {
    let project = TestProject::new();
    project.init();
    let id = project.wake("core/foo", "X");

    let status = project.stdout(&["status"]);
    assert!(status.contains("sessions: 1"));
    assert!(status.contains("pending 1"));

    let tree = project.stdout(&["tree"]);
    assert!(tree.contains(&id[..8]));
    assert!(tree.contains("[pending] core/foo"));
}

#[test]
fn log_records_session_creation() {
    let project = TestProject::new();
    project.init();
    let id = project.wake("core/foo", "X");

    let log = project.stdout(&["log", &id]);
    assert!(log.contains("session_created"));
    assert!(log.contains(&id[..8]));
}

#[test]
fn diagnose_is_quiet_on_a_healthy_store() {
    let project = TestProject::new();
    project.init();
    project.wake("core/foo", "X");
    let out = project.stdout(&["diagnose"]);
    assert_eq!(out.trim(), "no issues found");
}
