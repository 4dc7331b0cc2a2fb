// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only queries over a state snapshot.
//!
//! Every view is serde-serializable so the same types feed both the CLI
//! renderer and the socket's `data` payloads.

use crate::config::DiagnoseConfig;
use chrono::{DateTime, Utc};
use ken_core::{format_age, trigger, Session, SessionId, SessionStatus};
use ken_storage::MaterializedState;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One node of the workflow tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: SessionId,
    pub ken_path: String,
    pub status: SessionStatus,
    /// Seconds since last update
    pub age_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    /// Seconds since the last checkpoint-bearing heartbeat
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_age_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Render this node and its subtree as indented lines.
    pub fn render(&self, depth: usize, into: &mut Vec<String>) {
        let marker = match self.status {
            SessionStatus::Complete => "✓",
            SessionStatus::Failed => "✗",
            SessionStatus::Sleeping => "z",
            SessionStatus::Active => "»",
            SessionStatus::Waking => "…",
            SessionStatus::Pending => "·",
        };
        let mut line = format!(
            "{}{} {} [{}] {} ({})",
            "  ".repeat(depth),
            marker,
            self.id.short(8),
            self.status,
            self.ken_path,
            format_age(self.age_secs as i64),
        );
        if let Some(trigger) = &self.trigger {
            line.push_str(&format!(" waiting-on {trigger}"));
        }
        if let Some(age) = self.checkpoint_age_secs {
            line.push_str(&format!(" ckpt {}", format_age(age as i64)));
        }
        into.push(line);
        for child in &self.children {
            child.render(depth + 1, into);
        }
    }
}

/// Subtree rooted at `root` (unique id prefix accepted), or all roots.
pub fn tree(
    state: &MaterializedState,
    root: Option<&str>,
    now: DateTime<Utc>,
) -> Option<Vec<TreeNode>> {
    match root {
        Some(id) => {
            let session = state.get_session(id)?;
            Some(vec![build_node(state, session, now)])
        }
        None => Some(
            state
                .roots()
                .into_iter()
                .map(|session| build_node(state, session, now))
                .collect(),
        ),
    }
}

fn build_node(state: &MaterializedState, session: &Session, now: DateTime<Utc>) -> TreeNode {
    TreeNode {
        id: session.id.clone(),
        ken_path: session.ken_path.as_str().to_string(),
        status: session.status,
        age_secs: session.age_secs(now),
        trigger: session.trigger.as_ref().map(|t| t.summary()),
        checkpoint_age_secs: session.checkpoint.as_ref().and_then(|_| {
            session
                .last_heartbeat
                .map(|at| (now - at).num_seconds().max(0) as u64)
        }),
        children: state
            .children_of(&session.id)
            .into_iter()
            .map(|child| build_node(state, child, now))
            .collect(),
    }
}

/// One audit record prepared for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLine {
    pub id: u64,
    pub at: DateTime<Utc>,
    pub kind: String,
    pub summary: String,
}

/// Everything `ken session <id>` shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetail {
    pub session: Session,
    pub depth: usize,
    pub recent_events: Vec<EventLine>,
}

/// Full detail for one session (unique id prefix accepted).
pub fn session_detail(
    state: &MaterializedState,
    id: &str,
    recent: usize,
) -> Option<SessionDetail> {
    let session = state.get_session(id)?;
    let events = state.events_for(&session.id);
    let recent_events = events
        .iter()
        .rev()
        .take(recent)
        .rev()
        .map(|stored| EventLine {
            id: stored.id,
            at: stored.event.at(),
            kind: stored.event.kind().to_string(),
            summary: stored.event.log_summary(),
        })
        .collect();
    Some(SessionDetail {
        session: session.clone(),
        depth: state.depth(&session.id),
        recent_events,
    })
}

/// Audit log lines, optionally filtered to one session.
pub fn log_lines(state: &MaterializedState, id: Option<&str>, limit: usize) -> Option<Vec<EventLine>> {
    let filter = match id {
        Some(id) => Some(state.get_session(id)?.id.clone()),
        None => None,
    };
    let lines: Vec<EventLine> = state
        .events
        .iter()
        .filter(|stored| match &filter {
            Some(id) => stored.event.session_id() == Some(id),
            None => true,
        })
        .map(|stored| EventLine {
            id: stored.id,
            at: stored.event.at(),
            kind: stored.event.kind().to_string(),
            summary: stored.event.log_summary(),
        })
        .collect();
    let skip = lines.len().saturating_sub(limit);
    Some(lines.into_iter().skip(skip).collect())
}

/// One unsatisfied link in a blocker chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blocker {
    pub id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    /// Trigger summary when the blocker itself is sleeping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting_on: Option<String>,
    /// Distance from the queried session
    pub depth: usize,
}

/// The blocker chain for a sleeping session: recursively enumerate the
/// unsatisfied ids in its trigger, leaf-first, so the head of the list
/// is a root cause.
pub fn why(state: &MaterializedState, id: &str, now: DateTime<Utc>) -> Option<Vec<Blocker>> {
    let session = state.get_session(id)?;
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    visited.insert(session.id.clone());
    collect_blockers(state, session, now, 1, &mut visited, &mut out);
    Some(out)
}

fn collect_blockers(
    state: &MaterializedState,
    session: &Session,
    now: DateTime<Utc>,
    depth: usize,
    visited: &mut HashSet<SessionId>,
    out: &mut Vec<Blocker>,
) {
    let Some(trigger) = &session.trigger else {
        return;
    };
    let status_of = |id: &SessionId| state.status_of(id);
    for blocked_on in trigger::blocking_ids(trigger, now, &status_of) {
        if !visited.insert(blocked_on.clone()) {
            continue;
        }
        let blocker_session = state.session(&blocked_on);
        // Leaf-first: descend before recording this link.
        if let Some(blocker_session) = blocker_session {
            if blocker_session.status == SessionStatus::Sleeping {
                collect_blockers(state, blocker_session, now, depth + 1, visited, out);
            }
        }
        out.push(Blocker {
            id: blocked_on.clone(),
            status: blocker_session.map(|s| s.status),
            waiting_on: blocker_session
                .and_then(|s| s.trigger.as_ref())
                .map(|t| t.summary()),
            depth,
        });
    }
}

/// One diagnose finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub message: String,
}

/// The diagnose ruleset: stalled actives, starved pendings, and
/// referential-integrity warnings.
pub fn diagnose(
    state: &MaterializedState,
    now: DateTime<Utc>,
    config: &DiagnoseConfig,
) -> Vec<Issue> {
    let mut issues = Vec::new();

    let mut ordered: Vec<&Session> = state.sessions.values().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));

    for session in ordered {
        match session.status {
            SessionStatus::Active => {
                let last_sign_of_life = session.last_heartbeat.unwrap_or(session.updated_at);
                let silent_for = (now - last_sign_of_life).num_seconds().max(0) as u64;
                if silent_for > config.stalled_active_secs {
                    issues.push(Issue {
                        session_id: Some(session.id.clone()),
                        message: format!(
                            "active for {} without a checkpoint",
                            format_age(silent_for as i64)
                        ),
                    });
                }
            }
            SessionStatus::Pending => {
                let waiting = session.age_secs(now);
                if waiting > config.stale_pending_secs {
                    issues.push(Issue {
                        session_id: Some(session.id.clone()),
                        message: format!("pending for {}", format_age(waiting as i64)),
                    });
                }
            }
            SessionStatus::Failed => {
                issues.push(Issue {
                    session_id: Some(session.id.clone()),
                    message: format!(
                        "failed: {}",
                        session.result.as_deref().unwrap_or("(no result)")
                    ),
                });
            }
            _ => {}
        }
    }

    for warning in state.integrity_warnings() {
        issues.push(Issue {
            session_id: None,
            message: warning,
        });
    }

    issues
}

/// Counts for `ken status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub pending: usize,
    pub waking: usize,
    pub active: usize,
    pub sleeping: usize,
    pub complete: usize,
    pub failed: usize,
    pub events: usize,
}

pub fn status_summary(state: &MaterializedState) -> StatusSummary {
    let count = |status: SessionStatus| state.with_status(status).len();
    StatusSummary {
        total: state.sessions.len(),
        pending: count(SessionStatus::Pending),
        waking: count(SessionStatus::Waking),
        active: count(SessionStatus::Active),
        sleeping: count(SessionStatus::Sleeping),
        complete: count(SessionStatus::Complete),
        failed: count(SessionStatus::Failed),
        events: state.events.len(),
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
