//! The raw request channel (`ken request`) without a running engine.

use crate::prelude::TestProject;

#[test]
fn unknown_request_type_yields_the_contract_error() {
    let project = TestProject::new();
    project.init();

    let output = project
        .ken()
        .args(["request", r#"{"type":"resize","session_id":"x"}"#])
        .assert()
        .code(1);
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    similar_asserts::assert_eq!(
        stdout.trim(),
        r#"{"ok":false,"error":"unknown request type"}"#
    );
}

#[test]
fn malformed_json_is_reported_in_the_envelope() {
    let project = TestProject::new();
    project.init();
    let output = project.ken().args(["request", "{nope"]).assert().code(1);
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    let response: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(response["ok"], false);
    assert!(response["error"]
        .as_str()
        .unwrap()
        .starts_with("malformed request"));
}

#[test]
fn guard_violations_do_not_mutate() {
    let project = TestProject::new();
    project.init();
    let id = project.wake("core/foo", "X");

    // The session is pending, not active: the request must be refused.
    let line = format!(r#"{{"type":"complete","session_id":"{id}","result":"R"}}"#);
    let output = project.ken().args(["request", &line]).assert().code(1);
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    let response: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(response["ok"], false);
    assert!(response["error"].as_str().unwrap().contains("pending"));

    assert_eq!(project.status_of(&id), "pending");
}

#[test]
fn requests_for_unknown_sessions_fail_without_mutation() {
    let project = TestProject::new();
    project.init();
    let output = project
        .ken()
        .args([
            "request",
            r#"{"type":"fail","session_id":"ghost","reason":"x"}"#,
        ])
        .assert()
        .code(1);
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    assert!(stdout.contains("unknown session"));
}

#[test]
fn ping_works_without_a_daemon() {
    let project = TestProject::new();
    project.init();
    let output = project
        .ken()
        .args(["request", r#"{"type":"ping"}"#])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    let response: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(response["ok"], true);
    assert_eq!(response["data"]["pong"], true);
}
