// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The prompt composer.
//!
//! Assembles the text delivered to an agent at wake time. Section order
//! is fixed: header, task, definition of done, communication contract,
//! recovery context, dependency results, kenning frames. Composition
//! never fails; anything unresolvable becomes a warning the caller
//! persists as a `warning` event.

use crate::grounding::ground;
use crate::kenning::{KenningError, KenningStore};
use ken_core::{Session, SessionId, SessionStatus};
use std::path::PathBuf;

/// A dependency's outcome, rendered into the Dependency-Results section.
#[derive(Debug, Clone)]
pub struct DepResult {
    pub id: SessionId,
    pub ken_path: String,
    pub status: SessionStatus,
    pub result: Option<String>,
}

/// A composed wake prompt plus compose-time warnings.
#[derive(Debug, Clone)]
pub struct Composed {
    pub prompt: String,
    pub warnings: Vec<String>,
}

/// Renders wake prompts from session state and the kenning tree.
#[derive(Debug, Clone)]
pub struct Composer {
    kennings: KenningStore,
    project_root: PathBuf,
}

impl Composer {
    /// Kennings live under `<project_root>/kens`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        Self {
            kennings: KenningStore::new(project_root.join("kens")),
            project_root,
        }
    }

    pub fn compose(&self, session: &Session, deps: &[DepResult]) -> Composed {
        let mut warnings = Vec::new();
        let mut prompt = String::new();

        // 1. Session header
        prompt.push_str(&format!(
            "# Session {id}\n\nKenning: {ken}\nMode: {mode}\n\n",
            id = session.id,
            ken = session.ken_path,
            mode = session.wake_mode(),
        ));

        // 2. Task statement
        prompt.push_str("## Task\n\n");
        prompt.push_str(&session.task);
        prompt.push_str("\n\n");

        // 3. Definition of done
        if let Some(done_when) = &session.done_when {
            prompt.push_str("## Definition of Done\n\n");
            prompt.push_str(&done_when.description);
            prompt.push('\n');
            for (i, criterion) in done_when.criteria.iter().enumerate() {
                prompt.push_str(&format!("{}. {}\n", i + 1, criterion));
            }
            if let Some(verify) = &done_when.verify {
                prompt.push_str(&format!("\nVerify with: `{verify}`\n"));
            }
            prompt.push('\n');
        }

        // 4. Communication contract
        prompt.push_str(&contract_section(&session.id));

        // 5. Recovery context
        if let Some(checkpoint) = &session.checkpoint {
            prompt.push_str("## Recovery Context\n\n");
            prompt.push_str("Your previous checkpoint, verbatim:\n\n");
            prompt.push_str(checkpoint);
            prompt.push_str("\n\n");
        }

        // 6. Dependency results
        if !deps.is_empty() {
            prompt.push_str("## Dependency Results\n\n");
            for dep in deps {
                prompt.push_str(&format!(
                    "- {ken} ({id}) - status: {status}\n",
                    ken = dep.ken_path,
                    id = dep.id.short(8),
                    status = dep.status,
                ));
                if let Some(result) = &dep.result {
                    for line in result.lines() {
                        prompt.push_str("    ");
                        prompt.push_str(line);
                        prompt.push('\n');
                    }
                }
            }
            prompt.push('\n');
        }

        // 7. Kenning frames
        match self.kennings.load(&session.ken_path) {
            Ok(kenning) => {
                if kenning.frames.is_empty() {
                    warnings.push(format!("kenning {} has no frames", session.ken_path));
                }
                for frame in &kenning.frames {
                    prompt.push_str(&format!("## Frame {}: {}\n\n", frame.number, frame.title));
                    let (body, mut frame_warnings) = ground(&frame.body, &self.project_root);
                    warnings.append(&mut frame_warnings);
                    prompt.push_str(&body);
                    prompt.push_str("\n\n");
                }
            }
            Err(KenningError::NotFound(path)) => {
                warnings.push(format!("kenning not found: {}", path.display()));
            }
            Err(KenningError::Io { path, source }) => {
                warnings.push(format!("failed to read kenning {}: {source}", path.display()));
            }
        }

        Composed {
            prompt: prompt.trim_end().to_string() + "\n",
            warnings,
        }
    }
}

/// The exact verbs the agent may send, with their shapes, plus the rule
/// that exactly one terminal request must precede exit.
fn contract_section(id: &SessionId) -> String {
    format!(
        r#"## Communication Contract

Send requests as single lines of JSON. You must emit exactly one
terminal request (complete, fail, sleep, or spawn_and_sleep) before
exiting. checkpoint may be sent any number of times while working.

- {{"type":"complete","session_id":"{id}","result":"<text>"}}
- {{"type":"fail","session_id":"{id}","reason":"<text>"}}
- {{"type":"sleep","session_id":"{id}","trigger":<trigger>,"checkpoint":"<text>"}}
- {{"type":"spawn_and_sleep","session_id":"{id}","children":[{{"ken":"<ken-path>","task":"<text>","done_when":{{...}}?}}],"trigger":<trigger>,"checkpoint":"<text>"}}
- {{"type":"checkpoint","session_id":"{id}","checkpoint":"<text>"}}

Triggers: {{"all_complete":[ids]}}, {{"any_complete":[ids]}},
{{"timeout_at":"<RFC3339>"}}, {{"timeout_seconds":<number>}},
{{"any":[triggers]}}. In spawn_and_sleep, "__CHILDREN__" in an id list
stands for the children being spawned.

"#
    )
}

#[cfg(test)]
#[path = "compose_tests.rs"]
mod tests;
