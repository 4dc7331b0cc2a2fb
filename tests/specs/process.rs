//! Agent-driven end-to-end scenarios through `ken process`.
//!
//! The agent driver is a shell script (see prelude) that dumps its
//! prompt and replays per-kenning plan files via `ken request` over the
//! engine socket.

use crate::prelude::TestProject;

fn scripted_project() -> TestProject {
    let project = TestProject::new();
    project.init();
    project.install_script_agent();
    project
}

/// Scenario: root completion.
#[test]
fn root_completion_end_to_end() {
    let project = scripted_project();
    project.write_kenning("core/foo", "## Frame 1: Guide\n\nthe guide\n");
    project.write_plan(
        "core_foo",
        &[r#"{"type":"complete","session_id":"__SELF__","result":"R"}"#],
    );

    let id = project.wake("core/foo", "X");
    project.ken().arg("process").assert().success();

    assert_eq!(project.status_of(&id), "complete");
    let detail = project.stdout(&["session", &id]);
    assert!(detail.contains("R"));

    let log = project.stdout(&["log", &id]);
    for kind in ["session_created", "agent_spawned", "complete"] {
        assert!(log.contains(kind), "log missing {kind}");
    }

    // The composed prompt carried the kenning frame and the contract.
    let prompt = project.prompt_for(&id);
    assert!(prompt.contains("Mode: fresh"));
    assert!(prompt.contains("the guide"));
    assert!(prompt.contains("spawn_and_sleep"));
}

/// Scenarios: spawn-and-sleep fan-out, trigger on last completion, and
/// the dependency results in the parent's second wake.
#[test]
fn fan_out_and_rejoin_end_to_end() {
    let project = scripted_project();
    project.write_kenning("core/root", "## Frame 1: R\n\nroot guide\n");
    project.write_kenning("core/child-a", "## Frame 1: A\n\nchild a guide\n");
    project.write_kenning("core/child-b", "## Frame 1: B\n\nchild b guide\n");

    project.write_plan(
        "core_root",
        &[r#"{"type":"spawn_and_sleep","session_id":"__SELF__","children":[{"ken":"core/child-a","task":"ta"},{"ken":"core/child-b","task":"tb"}],"trigger":{"all_complete":"__CHILDREN__"},"checkpoint":"cp"}"#],
    );
    project.write_plan(
        "core_root.deps",
        &[r#"{"type":"complete","session_id":"__SELF__","result":"combined"}"#],
    );
    project.write_plan(
        "core_child-a",
        &[r#"{"type":"complete","session_id":"__SELF__","result":"r1"}"#],
    );
    project.write_plan(
        "core_child-b",
        &[r#"{"type":"complete","session_id":"__SELF__","result":"r2"}"#],
    );

    let root = project.wake("core/root", "coordinate");

    // Wake 1: the root fans out and goes to sleep.
    project.ken().arg("process").assert().success();
    assert_eq!(project.status_of(&root), "sleeping");
    let tree = project.stdout(&["tree", &root]);
    assert!(tree.contains("[sleeping]"));
    assert_eq!(tree.matches("[pending]").count(), 2);
    assert!(tree.contains("waiting-on all_complete"));

    // `why` lists both pending children as root causes.
    let why = project.stdout(&["why", &root]);
    assert!(why.contains("blocked on"));
    assert_eq!(why.matches("[pending]").count(), 2);

    // Wake 2: one child completes; the parent must stay asleep.
    project.ken().arg("process").assert().success();
    assert_eq!(project.status_of(&root), "sleeping");

    // Wake 3: the second child completes.
    project.ken().arg("process").assert().success();

    // Wake 4: the trigger fires and the root re-wakes with both results.
    project.ken().arg("process").assert().success();
    assert_eq!(project.status_of(&root), "complete");

    let prompt = project.prompt_for(&root);
    assert!(prompt.contains("Mode: recover"));
    assert!(prompt.contains("## Dependency Results"));
    assert!(prompt.contains("r1"));
    assert!(prompt.contains("r2"));
    assert!(prompt.contains("cp"));

    let log = project.stdout(&["log", &root]);
    for kind in ["spawn", "sleep", "trigger_satisfied", "complete"] {
        assert!(log.contains(kind), "log missing {kind}");
    }
}

/// Scenario: a failed child still unblocks all_complete, and the parent
/// sees the failure in its dependency results.
#[test]
fn failed_child_unblocks_the_parent_end_to_end() {
    let project = scripted_project();
    project.write_kenning("core/root", "## Frame 1: R\n\nroot guide\n");
    project.write_kenning("core/child-a", "## Frame 1: A\n\na\n");
    project.write_kenning("core/child-b", "## Frame 1: B\n\nb\n");

    project.write_plan(
        "core_root",
        &[r#"{"type":"spawn_and_sleep","session_id":"__SELF__","children":[{"ken":"core/child-a","task":"ta"},{"ken":"core/child-b","task":"tb"}],"trigger":{"all_complete":"__CHILDREN__"},"checkpoint":"cp"}"#],
    );
    project.write_plan(
        "core_root.deps",
        &[r#"{"type":"complete","session_id":"__SELF__","result":"handled"}"#],
    );
    project.write_plan(
        "core_child-a",
        &[r#"{"type":"fail","session_id":"__SELF__","reason":"boom"}"#],
    );
    project.write_plan(
        "core_child-b",
        &[r#"{"type":"complete","session_id":"__SELF__","result":"r2"}"#],
    );

    let root = project.wake("core/root", "coordinate");
    for _ in 0..4 {
        project.ken().arg("process").assert().success();
    }

    assert_eq!(project.status_of(&root), "complete");
    let prompt = project.prompt_for(&root);
    assert!(prompt.contains("status: failed"));
    assert!(prompt.contains("boom"));
    assert!(prompt.contains("status: complete"));
    assert!(prompt.contains("r2"));
}

/// Scenario: timeout without dependencies; the re-wake carries the
/// checkpoint verbatim and no dependency section.
#[test]
fn timeout_rewake_end_to_end() {
    let project = scripted_project();
    project.write_kenning("core/wait", "## Frame 1: W\n\nwaiting guide\n");
    project.write_plan(
        "core_wait",
        &[r#"{"type":"sleep","session_id":"__SELF__","trigger":{"timeout_seconds":0},"checkpoint":"wait"}"#],
    );
    project.write_plan(
        "core_wait.recover",
        &[r#"{"type":"complete","session_id":"__SELF__","result":"after"}"#],
    );

    let id = project.wake("core/wait", "wait then act");

    project.ken().arg("process").assert().success();
    assert_eq!(project.status_of(&id), "sleeping");

    // timeout_seconds 0: due on the very next pass.
    project.ken().arg("process").assert().success();
    assert_eq!(project.status_of(&id), "complete");

    let prompt = project.prompt_for(&id);
    assert!(prompt.contains("## Recovery Context"));
    assert!(prompt.contains("wait"));
    assert!(!prompt.contains("## Dependency Results"));
}

/// An agent that exits without a terminal request is a crash: the
/// session fails with a synthetic result.
#[test]
fn agent_exit_without_terminal_request_is_a_crash() {
    let project = scripted_project();
    project.write_kenning("core/flaky", "## Frame 1: F\n\nf\n");
    // The plan only checkpoints; the script then exits.
    project.write_plan(
        "core_flaky",
        &[r#"{"type":"checkpoint","session_id":"__SELF__","checkpoint":"got this far"}"#],
    );

    let id = project.wake("core/flaky", "X");
    project.ken().arg("process").assert().success();

    assert_eq!(project.status_of(&id), "failed");
    let detail = project.stdout(&["session", &id]);
    assert!(detail.contains("without a terminal request"));
    // The checkpoint it saved survives for `ken recover`.
    assert!(detail.contains("got this far"));

    project.ken().args(["recover", &id]).assert().success();
    assert_eq!(project.status_of(&id), "pending");
}

/// The definition of done is delivered verbatim in the prompt.
#[test]
fn done_when_reaches_the_agent_prompt() {
    let project = scripted_project();
    project.write_kenning("core/foo", "## Frame 1: G\n\ng\n");
    std::fs::write(
        project.root().join("done.json"),
        r#"{"description":"green build","criteria":["tests pass"],"verify":"cargo test"}"#,
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
    let id = id.trim().to_string();
    project.ken().arg("process").assert().success();

    let prompt = project.prompt_for(&id);
    assert!(prompt.contains("## Definition of Done"));
    assert!(prompt.contains("green build"));
    assert!(prompt.contains("1. tests pass"));
    assert!(prompt.contains("cargo test"));
}
