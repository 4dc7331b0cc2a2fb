// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL commit log.
//!
//! One line is one committed transaction: `{"seq":N,"events":[...]}\n`,
//! fsynced before the commit is acknowledged. A crash can only tear the
//! final line, and a torn line fails to parse and is dropped at open,
//! which is exactly the all-or-nothing semantics transactions need.

use ken_core::Event;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors from WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialization helper for writing a commit without cloning its events.
#[derive(Serialize)]
struct CommitRecordRef<'a> {
    seq: u64,
    events: &'a [Event],
}

/// Deserialization helper for reading commits.
#[derive(Deserialize)]
struct CommitRecord {
    seq: u64,
    events: Vec<Event>,
}

/// One committed transaction read back from the log.
#[derive(Debug, Clone)]
pub struct WalCommit {
    pub seq: u64,
    pub events: Vec<Event>,
}

/// Append-only commit log with per-commit fsync.
pub struct Wal {
    file: File,
    path: PathBuf,
    /// Sequence of the most recently written commit
    last_seq: u64,
}

impl Wal {
    /// Open or create a WAL at the given path.
    ///
    /// Scans existing commits to find the last sequence number. A corrupt
    /// tail (torn write from a crash) rotates the file to `.bak` and
    /// rewrites it with only the valid prefix.
    pub fn open(path: &Path) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (commits, corrupt) = read_commit_lines(&file)?;
        let last_seq = commits.iter().map(|(seq, _)| *seq).max().unwrap_or(0);

        if corrupt {
            drop(file);
            let bak_path = crate::snapshot::rotate_bak_path(path);
            warn!(
                path = %path.display(),
                bak = %bak_path.display(),
                valid_commits = commits.len(),
                "corrupt WAL tail detected, rotating to .bak and keeping the valid prefix",
            );
            std::fs::rename(path, &bak_path)?;

            {
                let mut clean = File::create(path)?;
                for (_, line) in &commits {
                    clean.write_all(line.as_bytes())?;
                    clean.write_all(b"\n")?;
                }
                clean.sync_all()?;
            }

            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .append(true)
                .open(path)?;
            return Ok(Self {
                file,
                path: path.to_owned(),
                last_seq,
            });
        }

        Ok(Self {
            file,
            path: path.to_owned(),
            last_seq,
        })
    }

    /// Sequence of the most recently written commit (0 when empty).
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Durably append one transaction.
    ///
    /// The commit is a single line followed by fsync; when this returns
    /// the events are on disk, all of them or none.
    pub fn commit(&mut self, events: &[Event]) -> Result<u64, WalError> {
        let seq = self.last_seq + 1;
        let record = CommitRecordRef { seq, events };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.sync_all()?;
        self.last_seq = seq;
        Ok(seq)
    }

    /// All commits with sequence greater than `seq`, for snapshot replay.
    pub fn commits_after(&self, seq: u64) -> Result<Vec<WalCommit>, WalError> {
        let (lines, _) = read_commit_lines(&self.file)?;
        let mut commits = Vec::new();
        for (line_seq, line) in lines {
            if line_seq > seq {
                let record: CommitRecord = serde_json::from_str(&line)?;
                commits.push(WalCommit {
                    seq: record.seq,
                    events: record.events,
                });
            }
        }
        Ok(commits)
    }

    /// Drop commits with sequence `<= seq`, reclaiming space after a
    /// snapshot has made them redundant. Atomic via tmp + rename.
    pub fn truncate_through(&mut self, seq: u64) -> Result<(), WalError> {
        let (lines, _) = read_commit_lines(&self.file)?;
        let tmp_path = self.path.with_extension("tmp");

        {
            let mut tmp = File::create(&tmp_path)?;
            for (line_seq, line) in &lines {
                if *line_seq > seq {
                    tmp.write_all(line.as_bytes())?;
                    tmp.write_all(b"\n")?;
                }
            }
            tmp.sync_all()?;
        }

        std::fs::rename(&tmp_path, &self.path)?;
        self.file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        Ok(())
    }
}

/// Read commits from a WAL file without taking ownership of it.
///
/// Used by read-only store opens; tolerates a corrupt tail by stopping
/// at it, and never rewrites the file.
pub(crate) fn read_commits(path: &Path) -> Result<Vec<WalCommit>, WalError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let (lines, _) = read_commit_lines(&file)?;
    let mut commits = Vec::new();
    for (_, line) in lines {
        let record: CommitRecord = serde_json::from_str(&line)?;
        commits.push(WalCommit {
            seq: record.seq,
            events: record.events,
        });
    }
    Ok(commits)
}

/// Scan the whole file, returning `(valid (seq, line) pairs, corrupt)`.
///
/// Stops at the first unparseable line; `corrupt` reports whether one was
/// found (torn tail) so callers can decide to rotate.
fn read_commit_lines(file: &File) -> Result<(Vec<(u64, String)>, bool), WalError> {
    let mut reader = BufReader::new(file.try_clone()?);
    reader.seek(SeekFrom::Start(0))?;

    let mut lines = Vec::new();
    let mut corrupt = false;
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                corrupt = true;
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<CommitRecord>(trimmed) {
            Ok(record) => lines.push((record.seq, trimmed.to_string())),
            Err(_) => {
                corrupt = true;
                break;
            }
        }
    }

    Ok((lines, corrupt))
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
