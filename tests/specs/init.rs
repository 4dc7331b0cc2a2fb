//! `ken init` behavior.

use crate::prelude::TestProject;

#[test]
fn init_creates_the_engine_directory() {
    let project = TestProject::new();
    project.ken().arg("init").assert().success();

    assert!(project.root().join(".ken").is_dir());
    assert!(project.root().join(".ken/config.toml").is_file());
    assert!(project.root().join(".ken/logs").is_dir());
}

#[test]
fn init_twice_exits_one() {
    let project = TestProject::new();
    project.init();
    project.ken().arg("init").assert().code(1);
}

#[test]
fn commands_outside_a_project_exit_one() {
    let project = TestProject::new();
    project.ken().arg("status").assert().code(1);
    project
        .ken()
        .args(["wake", "core/foo", "--task", "X"])
        .assert()
        .code(1);
}
