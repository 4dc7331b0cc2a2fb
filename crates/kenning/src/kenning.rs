// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kenning file grammar.
//!
//! UTF-8 markdown. Frames are sections whose heading matches
//! `## Frame <N>: <Title>` (case-insensitive, whitespace-tolerant); the
//! body runs until the next `## ` heading or EOF. Everything else
//! (`## Meta`, `## Task`, unknown headings) is ignored. The parser is
//! lenient: no frames is a legal, empty kenning.

use ken_core::KenPath;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

#[allow(clippy::expect_used)]
static FRAME_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^##\s+frame\s+(\d+)\s*:\s*(.*?)\s*$").expect("constant regex pattern is valid")
});

/// Errors from loading a kenning file
#[derive(Debug, Error)]
pub enum KenningError {
    #[error("no kenning at {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One section of a kenning, delivered in order to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub number: u32,
    pub title: String,
    pub body: String,
}

/// A parsed kenning: its frames, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Kenning {
    pub frames: Vec<Frame>,
}

impl Kenning {
    /// Parse kenning markdown. Never fails; unknown sections are skipped.
    pub fn parse(text: &str) -> Self {
        let mut frames = Vec::new();
        let mut current: Option<Frame> = None;
        let mut body = String::new();

        let mut finish = |frame: Option<Frame>, body: &mut String| {
            if let Some(mut frame) = frame {
                frame.body = body.trim().to_string();
                frames.push(frame);
            }
            body.clear();
        };

        for line in text.lines() {
            if let Some(caps) = FRAME_HEADING.captures(line) {
                finish(current.take(), &mut body);
                let number = caps
                    .get(1)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0);
                let title = caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string();
                current = Some(Frame {
                    number,
                    title,
                    body: String::new(),
                });
            } else if line.starts_with("## ") {
                // Non-frame section: Meta, Task, Reflection, anything else.
                finish(current.take(), &mut body);
            } else if current.is_some() {
                body.push_str(line);
                body.push('\n');
            }
        }
        finish(current, &mut body);

        Self { frames }
    }

    /// Render back to markdown. `parse(to_markdown(parse(x)))` yields the
    /// same frame list as `parse(x)`.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for frame in &self.frames {
            out.push_str(&format!("## Frame {}: {}\n\n", frame.number, frame.title));
            if !frame.body.is_empty() {
                out.push_str(&frame.body);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

/// Read-only access to the `kens/` tree. Kennings are read fresh per
/// compose; the engine never writes them.
#[derive(Debug, Clone)]
pub struct KenningStore {
    root: PathBuf,
}

impl KenningStore {
    pub fn new(kens_root: impl Into<PathBuf>) -> Self {
        Self {
            root: kens_root.into(),
        }
    }

    pub fn file_path(&self, ken_path: &KenPath) -> PathBuf {
        let mut path = self.root.clone();
        for segment in ken_path.segments() {
            path.push(segment);
        }
        path.join("kenning.md")
    }

    pub fn load(&self, ken_path: &KenPath) -> Result<Kenning, KenningError> {
        let path = self.file_path(ken_path);
        if !path.exists() {
            return Err(KenningError::NotFound(path));
        }
        let text = std::fs::read_to_string(&path).map_err(|source| KenningError::Io {
            path: path.clone(),
            source,
        })?;
        let kenning = Kenning::parse(&text);
        tracing::debug!(ken = %ken_path, frames = kenning.frames.len(), "loaded kenning");
        Ok(kenning)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
#[path = "kenning_tests.rs"]
mod tests;
