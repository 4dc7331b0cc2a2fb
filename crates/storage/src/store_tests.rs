// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{DateTime, TimeZone, Utc};
use ken_core::{Event, KenPath, Trigger, WakeMode};

fn at(min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 9, min, 0).single().unwrap()
}

fn paths(dir: &std::path::Path) -> StorePaths {
    StorePaths::under(&dir.join("store"))
}

fn created(id: &str, parent: Option<&str>, minute: u32) -> Event {
    Event::SessionCreated {
        id: SessionId::new(id),
        ken_path: KenPath::new("core/test").unwrap(),
        task: "t".to_string(),
        done_when: None,
        parent_id: parent.map(SessionId::new),
        at: at(minute),
    }
}

fn make_active(store: &Store, id: &str, minute: u32) {
    store
        .transaction(|tx| {
            tx.stage(Event::Wake {
                id: SessionId::new(id),
                mode: WakeMode::Fresh,
                at: at(minute),
            })?;
            tx.stage(Event::AgentSpawned {
                id: SessionId::new(id),
                pid: None,
                mode: WakeMode::Fresh,
                at: at(minute),
            })
        })
        .unwrap();
}

#[test]
fn committed_transactions_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path());
    {
        let store = Store::open(&paths).unwrap();
        store
            .transaction(|tx| tx.stage(created("s-1", None, 0)))
            .unwrap();
    }
    let store = Store::open(&paths).unwrap();
    store.read(|state| {
        let session = state.get_session("s-1").unwrap();
        assert_eq!(session.status, SessionStatus::Pending);
    });
}

#[test]
fn failed_transactions_leave_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path());
    let store = Store::open(&paths).unwrap();

    let result = store.transaction(|tx| {
        tx.stage(created("s-1", None, 0))?;
        // Second event is invalid: the session is pending, not active.
        tx.stage(Event::Complete {
            id: SessionId::new("s-1"),
            result: "r".to_string(),
            at: at(1),
        })
    });
    assert!(matches!(result, Err(StoreError::InvalidTransition { .. })));

    store.read(|state| {
        assert!(state.sessions.is_empty());
        assert!(state.events.is_empty());
    });
}

#[test]
fn id_collisions_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&paths(dir.path())).unwrap();
    store
        .transaction(|tx| tx.stage(created("s-1", None, 0)))
        .unwrap();
    let result = store.transaction(|tx| tx.stage(created("s-1", None, 1)));
    assert!(matches!(result, Err(StoreError::Conflict(_))));
}

#[test]
fn unknown_parent_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&paths(dir.path())).unwrap();
    let result = store.transaction(|tx| tx.stage(created("child", Some("ghost"), 0)));
    assert!(matches!(result, Err(StoreError::UnknownReference(_))));
}

#[test]
fn sleep_rejects_dangling_trigger_references() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&paths(dir.path())).unwrap();
    store
        .transaction(|tx| tx.stage(created("s", None, 0)))
        .unwrap();
    make_active(&store, "s", 1);

    let result = store.transaction(|tx| {
        tx.stage(Event::Sleep {
            id: SessionId::new("s"),
            trigger: Trigger::AllComplete(vec![SessionId::new("ghost")]),
            checkpoint: None,
            at: at(2),
        })
    });
    assert!(matches!(result, Err(StoreError::UnknownReference(_))));
}

#[test]
fn sleep_rejects_self_reference() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&paths(dir.path())).unwrap();
    store
        .transaction(|tx| tx.stage(created("s", None, 0)))
        .unwrap();
    make_active(&store, "s", 1);

    let result = store.transaction(|tx| {
        tx.stage(Event::Sleep {
            id: SessionId::new("s"),
            trigger: Trigger::AllComplete(vec![SessionId::new("s")]),
            checkpoint: None,
            at: at(2),
        })
    });
    assert!(matches!(result, Err(StoreError::SelfReference(_))));
}

#[test]
fn terminal_sessions_reject_further_transitions() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&paths(dir.path())).unwrap();
    store
        .transaction(|tx| tx.stage(created("s", None, 0)))
        .unwrap();
    make_active(&store, "s", 1);
    store
        .transaction(|tx| {
            tx.stage(Event::Complete {
                id: SessionId::new("s"),
                result: "r".to_string(),
                at: at(2),
            })
        })
        .unwrap();

    for event in [
        Event::Wake {
            id: SessionId::new("s"),
            mode: WakeMode::Fresh,
            at: at(3),
        },
        Event::Failed {
            id: SessionId::new("s"),
            reason: "again".to_string(),
            at: at(3),
        },
        Event::Complete {
            id: SessionId::new("s"),
            result: "again".to_string(),
            at: at(3),
        },
    ] {
        let result = store.transaction(|tx| tx.stage(event.clone()));
        assert!(
            matches!(result, Err(StoreError::InvalidTransition { .. })),
            "terminal session accepted {}",
            event.kind()
        );
    }
}

#[test]
fn operator_recover_only_applies_to_failed_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&paths(dir.path())).unwrap();
    store
        .transaction(|tx| tx.stage(created("s", None, 0)))
        .unwrap();

    let premature = store.transaction(|tx| {
        tx.stage(Event::Recover {
            id: SessionId::new("s"),
            source: ken_core::RecoverSource::Operator,
            at: at(1),
        })
    });
    assert!(matches!(premature, Err(StoreError::WrongStatus { .. })));

    make_active(&store, "s", 1);
    store
        .transaction(|tx| {
            tx.stage(Event::Failed {
                id: SessionId::new("s"),
                reason: "boom".to_string(),
                at: at(2),
            })
        })
        .unwrap();
    store
        .transaction(|tx| {
            tx.stage(Event::Recover {
                id: SessionId::new("s"),
                source: ken_core::RecoverSource::Operator,
                at: at(3),
            })
        })
        .unwrap();
    store.read(|state| {
        assert_eq!(state.status_of(&SessionId::new("s")), Some(SessionStatus::Pending));
    });
}

/// The hardest invariant in the system: a spawn_and_sleep commit torn by
/// a crash must recover to zero children and an intact parent.
#[test]
fn torn_spawn_and_sleep_commit_rolls_back_completely() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path());
    {
        let store = Store::open(&paths).unwrap();
        store
            .transaction(|tx| tx.stage(created("parent", None, 0)))
            .unwrap();
        make_active(&store, "parent", 1);

        // The full spawn-and-sleep batch in one transaction.
        store
            .transaction(|tx| {
                tx.stage(Event::Spawn {
                    id: SessionId::new("parent"),
                    children: vec![
                        SessionId::new("c1"),
                        SessionId::new("c2"),
                        SessionId::new("c3"),
                    ],
                    at: at(2),
                })?;
                for child in ["c1", "c2", "c3"] {
                    tx.stage(created(child, Some("parent"), 2))?;
                }
                tx.stage(Event::Sleep {
                    id: SessionId::new("parent"),
                    trigger: Trigger::AllComplete(vec![
                        SessionId::new("c1"),
                        SessionId::new("c2"),
                        SessionId::new("c3"),
                    ]),
                    checkpoint: Some("cp".to_string()),
                    at: at(2),
                })
            })
            .unwrap();
    }

    // Crash injection: tear the commit line anywhere inside it.
    let content = std::fs::read_to_string(&paths.wal).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    let keep: String = lines[..lines.len() - 1].join("\n") + "\n";
    let torn_line = lines[lines.len() - 1];
    for cut in [1, torn_line.len() / 2, torn_line.len() - 1] {
        std::fs::write(&paths.wal, format!("{keep}{}", &torn_line[..cut])).unwrap();
        let store = Store::open(&paths).unwrap();
        store.read(|state| {
            // Either no children and an active parent...
            let parent = state.get_session("parent").unwrap();
            assert_eq!(parent.status, SessionStatus::Active);
            assert!(parent.trigger.is_none());
            assert!(state.children_of(&SessionId::new("parent")).is_empty());
            assert!(!state.events.iter().any(|e| e.event.kind() == "spawn"));
        });
        // Remove the rotated .bak so the next iteration starts clean.
        let _ = std::fs::remove_file(paths.wal.with_extension("bak"));
    }

    // ...and with the intact line, exactly three children and a sleeping
    // parent with the right trigger.
    std::fs::write(&paths.wal, format!("{keep}{torn_line}\n")).unwrap();
    let store = Store::open(&paths).unwrap();
    store.read(|state| {
        let parent = state.get_session("parent").unwrap();
        assert_eq!(parent.status, SessionStatus::Sleeping);
        assert_eq!(state.children_of(&SessionId::new("parent")).len(), 3);
        assert_eq!(
            parent.trigger,
            Some(Trigger::AllComplete(vec![
                SessionId::new("c1"),
                SessionId::new("c2"),
                SessionId::new("c3"),
            ]))
        );
    });
}

#[test]
fn read_only_stores_reject_transactions() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path());
    {
        let store = Store::open(&paths).unwrap();
        store
            .transaction(|tx| tx.stage(created("s", None, 0)))
            .unwrap();
    }
    let reader = Store::open_read_only(&paths).unwrap();
    reader.read(|state| assert!(state.get_session("s").is_some()));
    let result = reader.transaction(|tx| tx.stage(created("other", None, 1)));
    assert!(matches!(result, Err(StoreError::ReadOnly)));
}

#[test]
fn snapshot_plus_replay_reconstructs_identical_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path());
    let before = {
        let store = Store::open(&paths).unwrap();
        store
            .transaction(|tx| tx.stage(created("s", None, 0)))
            .unwrap();
        make_active(&store, "s", 1);
        store.save_snapshot().unwrap();
        // One commit past the snapshot, to be replayed from the WAL.
        store
            .transaction(|tx| {
                tx.stage(Event::Checkpoint {
                    id: SessionId::new("s"),
                    checkpoint: "cp".to_string(),
                    at: at(2),
                })
            })
            .unwrap();
        store.state_snapshot()
    };

    let store = Store::open(&paths).unwrap();
    let after = store.state_snapshot();
    assert_eq!(after.sessions.get("s"), before.sessions.get("s"));
    assert_eq!(after.last_event_id, before.last_event_id);
}

#[test]
fn read_only_transactions_do_not_bump_the_wal() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path());
    let store = Store::open(&paths).unwrap();
    store
        .transaction(|tx| tx.stage(created("s", None, 0)))
        .unwrap();

    let status = store
        .transaction(|tx| Ok(tx.session(&SessionId::new("s"))?.status))
        .unwrap();
    assert_eq!(status, SessionStatus::Pending);

    let commits = {
        let wal = Wal::open(&paths.wal).unwrap();
        wal.commits_after(0).unwrap().len()
    };
    assert_eq!(commits, 1);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Whatever interleaving of valid and invalid transitions hits the
        /// store, the trigger/sleeping and result/terminal invariants hold
        /// afterwards and event ids stay strictly increasing.
        #[test]
        fn invariants_hold_under_random_event_streams(
            ops in proptest::collection::vec(0u8..8, 1..40),
        ) {
            let dir = tempfile::tempdir().unwrap();
            let store = Store::open(&StorePaths::under(dir.path())).unwrap();

            let mut minted = 0u32;
            for op in &ops {
                let target = SessionId::new(format!("s-{}", minted.saturating_sub(1)));
                // Errors are expected: invalid ops must simply not mutate.
                let _ = match op {
                    0 => {
                        minted += 1;
                        let id = format!("s-{}", minted - 1);
                        store.transaction(|tx| tx.stage(created(&id, None, 0)))
                    }
                    1 => store.transaction(|tx| {
                        tx.stage(Event::Wake {
                            id: target.clone(),
                            mode: WakeMode::Fresh,
                            at: at(1),
                        })
                    }),
                    2 => store.transaction(|tx| {
                        tx.stage(Event::AgentSpawned {
                            id: target.clone(),
                            pid: None,
                            mode: WakeMode::Fresh,
                            at: at(2),
                        })
                    }),
                    3 => store.transaction(|tx| {
                        tx.stage(Event::Sleep {
                            id: target.clone(),
                            trigger: Trigger::TimeoutAt(at(30)),
                            checkpoint: Some("cp".to_string()),
                            at: at(3),
                        })
                    }),
                    4 => store.transaction(|tx| {
                        tx.stage(Event::TriggerSatisfied {
                            id: target.clone(),
                            at: at(4),
                        })
                    }),
                    5 => store.transaction(|tx| {
                        tx.stage(Event::Complete {
                            id: target.clone(),
                            result: "r".to_string(),
                            at: at(5),
                        })
                    }),
                    6 => store.transaction(|tx| {
                        tx.stage(Event::Failed {
                            id: target.clone(),
                            reason: "x".to_string(),
                            at: at(6),
                        })
                    }),
                    _ => store.transaction(|tx| {
                        tx.stage(Event::Recover {
                            id: target.clone(),
                            source: ken_core::RecoverSource::Operator,
                            at: at(7),
                        })
                    }),
                };
            }

            store.read(|state| {
                for session in state.sessions.values() {
                    prop_assert_eq!(
                        session.trigger.is_some(),
                        session.status == SessionStatus::Sleeping,
                        "trigger/sleeping invariant broken for {}",
                        &session.id
                    );
                    prop_assert_eq!(
                        session.result.is_some(),
                        session.status.is_terminal(),
                        "result/terminal invariant broken for {}",
                        &session.id
                    );
                }
                for pair in state.events.windows(2) {
                    prop_assert!(pair[0].id < pair[1].id);
                }
                Ok(())
            })?;
        }
    }
}
