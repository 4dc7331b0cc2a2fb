// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn initialised(dir: &std::path::Path) -> ProjectPaths {
    let paths = ProjectPaths::new(dir);
    paths.init().unwrap();
    paths
}

#[test]
fn lock_is_exclusive_within_a_project() {
    let dir = tempfile::tempdir().unwrap();
    let paths = initialised(dir.path());

    let lock = acquire_lock(&paths).unwrap();
    assert!(matches!(acquire_lock(&paths), Err(LifecycleError::LockHeld)));

    drop(lock);
    assert!(acquire_lock(&paths).is_ok());
}

#[test]
fn lock_records_the_pid() {
    let dir = tempfile::tempdir().unwrap();
    let paths = initialised(dir.path());
    let _lock = acquire_lock(&paths).unwrap();

    let recorded = std::fs::read_to_string(paths.lock()).unwrap();
    assert_eq!(recorded.trim(), std::process::id().to_string());
}

#[test]
fn lock_requires_an_initialised_project() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ProjectPaths::new(dir.path());
    assert!(matches!(
        acquire_lock(&paths),
        Err(LifecycleError::NotInitialised(_))
    ));
}

#[tokio::test]
async fn bind_socket_clears_stale_files() {
    let dir = tempfile::tempdir().unwrap();
    let paths = initialised(dir.path());

    // A stale socket file from a crashed engine.
    std::fs::write(paths.socket(), b"").unwrap();
    let listener = bind_socket(&paths).unwrap();
    drop(listener);

    remove_runtime_files(&paths);
    assert!(!paths.socket().exists());
    assert!(!paths.lock().exists());
}
