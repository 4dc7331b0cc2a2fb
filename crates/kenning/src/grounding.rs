// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Grounding-token substitution.
//!
//! Kenning frames may embed `{{file:path}}` and `{{tree:path}}` tokens,
//! resolved against the project working directory at compose time. A
//! token that cannot resolve renders a placeholder and surfaces a
//! warning; substitution itself never fails.

use regex::Regex;
use std::path::{Component, Path};
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static GROUNDING_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{(file|tree):([^}]+)\}\}").expect("constant regex pattern is valid")
});

/// Listing depth for `{{tree:...}}` tokens
const TREE_MAX_DEPTH: usize = 3;

/// Substitute grounding tokens in `text` against `project_root`.
///
/// Returns the substituted text plus a warning per unresolvable token.
pub fn ground(text: &str, project_root: &Path) -> (String, Vec<String>) {
    let mut warnings = Vec::new();
    let out = GROUNDING_TOKEN.replace_all(text, |caps: &regex::Captures<'_>| {
        let kind = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let raw_path = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");

        let Some(full) = safe_join(project_root, raw_path) else {
            warnings.push(format!("grounding token escapes the project: {raw_path}"));
            return format!("[unresolvable path: {raw_path}]");
        };

        match kind {
            "file" => match std::fs::read_to_string(&full) {
                Ok(content) => content,
                Err(_) => {
                    warnings.push(format!("missing grounding file: {raw_path}"));
                    format!("[missing file: {raw_path}]")
                }
            },
            _ => {
                if full.is_dir() {
                    let mut listing = String::new();
                    render_tree(&full, 0, &mut listing);
                    listing
                } else {
                    warnings.push(format!("missing grounding directory: {raw_path}"));
                    format!("[missing directory: {raw_path}]")
                }
            }
        }
    });
    (out.into_owned(), warnings)
}

/// Join a token path under the root, rejecting absolute paths and any
/// `..` traversal.
fn safe_join(root: &Path, raw: &str) -> Option<std::path::PathBuf> {
    let relative = Path::new(raw);
    if relative.is_absolute() {
        return None;
    }
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return None,
        }
    }
    Some(root.join(relative))
}

fn render_tree(dir: &Path, depth: usize, into: &mut String) {
    if depth >= TREE_MAX_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    let mut names: Vec<(String, bool)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                return None;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            Some((name, is_dir))
        })
        .collect();
    names.sort();

    for (name, is_dir) in names {
        into.push_str(&"  ".repeat(depth));
        into.push_str(&name);
        if is_dir {
            into.push('/');
            into.push('\n');
            render_tree(&dir.join(&name), depth + 1, into);
        } else {
            into.push('\n');
        }
    }
}

#[cfg(test)]
#[path = "grounding_tests.rs"]
mod tests;
