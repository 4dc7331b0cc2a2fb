// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-facing rendering for the read-only views.

use ken_engine::{Blocker, EventLine, Issue, SessionDetail, StatusSummary, TreeNode};

pub fn render_status(summary: &StatusSummary) -> String {
    format!(
        "sessions: {total} (pending {pending}, waking {waking}, active {active}, \
         sleeping {sleeping}, complete {complete}, failed {failed})\nevents: {events}",
        total = summary.total,
        pending = summary.pending,
        waking = summary.waking,
        active = summary.active,
        sleeping = summary.sleeping,
        complete = summary.complete,
        failed = summary.failed,
        events = summary.events,
    )
}

pub fn render_tree(nodes: &[TreeNode]) -> String {
    if nodes.is_empty() {
        return "no sessions".to_string();
    }
    let mut lines = Vec::new();
    for node in nodes {
        node.render(0, &mut lines);
    }
    lines.join("\n")
}

pub fn render_session(detail: &SessionDetail) -> String {
    let session = &detail.session;
    let mut out = String::new();
    out.push_str(&format!("id:        {}\n", session.id));
    out.push_str(&format!("ken:       {}\n", session.ken_path));
    out.push_str(&format!("status:    {}\n", session.status));
    out.push_str(&format!("depth:     {}\n", detail.depth));
    if let Some(parent) = &session.parent_id {
        out.push_str(&format!("parent:    {parent}\n"));
    }
    out.push_str(&format!("task:      {}\n", session.task));
    if let Some(done_when) = &session.done_when {
        out.push_str(&format!("done when: {}\n", done_when.description));
        for criterion in &done_when.criteria {
            out.push_str(&format!("  - {criterion}\n"));
        }
        if let Some(verify) = &done_when.verify {
            out.push_str(&format!("  verify: {verify}\n"));
        }
    }
    if let Some(trigger) = &session.trigger {
        out.push_str(&format!("trigger:   {}\n", trigger.summary()));
    }
    out.push_str(&format!("created:   {}\n", session.created_at.to_rfc3339()));
    out.push_str(&format!("updated:   {}\n", session.updated_at.to_rfc3339()));
    if let Some(checkpoint) = &session.checkpoint {
        out.push_str("checkpoint:\n");
        for line in checkpoint.lines() {
            out.push_str(&format!("  {line}\n"));
        }
    }
    if let Some(result) = &session.result {
        out.push_str("result:\n");
        for line in result.lines() {
            out.push_str(&format!("  {line}\n"));
        }
    }
    if !detail.recent_events.is_empty() {
        out.push_str("recent events:\n");
        for event in &detail.recent_events {
            out.push_str(&format!("  {}\n", format_event(event)));
        }
    }
    out.trim_end().to_string()
}

pub fn render_blockers(id: &str, blockers: &[Blocker]) -> String {
    if blockers.is_empty() {
        return format!("{id} is not blocked on any session");
    }
    let mut out = vec![format!("{id} is blocked on (root causes first):")];
    for blocker in blockers {
        let status = blocker
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "missing!".to_string());
        let mut line = format!("  {} [{}]", blocker.id.short(8), status);
        if let Some(waiting_on) = &blocker.waiting_on {
            line.push_str(&format!(" waiting-on {waiting_on}"));
        }
        out.push(line);
    }
    out.join("\n")
}

pub fn render_log(events: &[EventLine]) -> String {
    if events.is_empty() {
        return "no events".to_string();
    }
    events
        .iter()
        .map(format_event)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_diagnose(issues: &[Issue]) -> String {
    if issues.is_empty() {
        return "no issues found".to_string();
    }
    issues
        .iter()
        .map(|issue| match &issue.session_id {
            Some(id) => format!("{}: {}", id.short(8), issue.message),
            None => issue.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_event(event: &EventLine) -> String {
    format!(
        "#{:<4} {} {}",
        event.id,
        event.at.format("%Y-%m-%d %H:%M:%S"),
        event.summary
    )
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
