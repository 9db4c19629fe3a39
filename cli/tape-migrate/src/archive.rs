// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Tape archive interface
//!
//! The [`Archive`] trait covers the two archive-side operations the tool
//! needs: listing a directory with per-file migration status, and asking
//! for a batch of files to be staged back to the disk cache.
//! [`MdssArchive`] implements it on top of the `mdss` client.

use std::collections::HashMap;
use std::fmt;
use std::process::Command;

use crate::command::run_command;
use crate::config::Programs;
use crate::error::{MigrateError, Result};

/// DMF migration status of one archived file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DmStatus {
    /// REG: only on disk, not yet migrated
    Regular,
    /// DUL: on disk and on tape
    DualState,
    /// OFL: only on tape
    Offline,
    /// MIG: migration to tape in progress
    Migrating,
    /// UNM: recall from tape in progress
    Unmigrating,
    /// PAR: partially on disk
    Partial,
    /// NMG: excluded from migration
    NonMigratable,
    /// Any code this tool does not know
    Unknown,
}

impl DmStatus {
    /// Parse a status column such as `(DUL)`
    pub fn from_code(code: &str) -> Self {
        match code.trim_start_matches('(').trim_end_matches(')') {
            "REG" => Self::Regular,
            "DUL" => Self::DualState,
            "OFL" => Self::Offline,
            "MIG" => Self::Migrating,
            "UNM" => Self::Unmigrating,
            "PAR" => Self::Partial,
            "NMG" => Self::NonMigratable,
            _ => Self::Unknown,
        }
    }

    /// The file's data has been written to tape
    pub fn on_tape(self) -> bool {
        matches!(self, Self::DualState | Self::Offline)
    }

    /// The file's data can be read without a tape mount
    pub fn on_fast_tier(self) -> bool {
        matches!(self, Self::Regular | Self::DualState)
    }
}

impl fmt::Display for DmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::Regular => "REG",
            Self::DualState => "DUL",
            Self::Offline => "OFL",
            Self::Migrating => "MIG",
            Self::Unmigrating => "UNM",
            Self::Partial => "PAR",
            Self::NonMigratable => "NMG",
            Self::Unknown => "???",
        };
        f.write_str(code)
    }
}

/// Size and status of one archived file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapeEntry {
    pub size: u64,
    pub status: DmStatus,
}

/// Snapshot of one archive directory, keyed by file name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TapeRecord {
    entries: HashMap<String, TapeEntry>,
}

impl TapeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: TapeEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&TapeEntry> {
        self.entries.get(name)
    }

    /// Recorded size of `name`, whatever its status
    pub fn size(&self, name: &str) -> Option<u64> {
        self.get(name).map(|e| e.size)
    }

    pub fn on_tape(&self, name: &str) -> bool {
        self.get(name).is_some_and(|e| e.status.on_tape())
    }

    pub fn on_fast_tier(&self, name: &str) -> bool {
        self.get(name).is_some_and(|e| e.status.on_fast_tier())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// External tape archive
pub trait Archive {
    /// List `dir` (archive-relative) as seen by `project`
    fn list(&self, dir: &str, project: &str) -> Result<TapeRecord>;

    /// Request that `paths` be recalled to the disk cache
    ///
    /// Fire-and-forget: completion is observed later through [`Archive::list`].
    fn stage(&self, project: &str, paths: &[String]) -> Result<()>;
}

/// The NCI mdss client
pub struct MdssArchive {
    mdss: String,
    xargs: String,
}

impl MdssArchive {
    pub fn new(programs: &Programs) -> Self {
        Self {
            mdss: programs.mdss.clone(),
            xargs: programs.xargs.clone(),
        }
    }
}

impl Archive for MdssArchive {
    fn list(&self, dir: &str, project: &str) -> Result<TapeRecord> {
        let output = run_command(
            Command::new(&self.mdss).args(["-P", project, "dmls", "-l", dir]),
            None,
        )?;
        parse_dmls(dir, &output)
    }

    fn stage(&self, project: &str, paths: &[String]) -> Result<()> {
        // NUL separators survive any file name.
        let input = paths.join("\0");
        run_command(
            Command::new(&self.xargs).args(["-r0", self.mdss.as_str(), "-P", project, "stage"]),
            Some(input.as_bytes()),
        )?;
        Ok(())
    }
}

/// Parse `dmls -l` output for `dir`
///
/// Expected line shape (the name may contain spaces):
///
/// ```text
/// -rw-r--r--  1 eb8858 wq2  1000 2019-05-01 10:12 (DUL) AAAAA.cram
/// ```
pub fn parse_dmls(dir: &str, output: &str) -> Result<TapeRecord> {
    let mut record = TapeRecord::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("total") {
            continue;
        }

        let (fields, name) =
            split_listing_line(trimmed).ok_or_else(|| MigrateError::UnexpectedListing {
                dir: dir.to_string(),
                reason: format!("too few columns in {:?}", trimmed),
            })?;

        let size = fields[4]
            .parse::<u64>()
            .map_err(|_| MigrateError::UnexpectedListing {
                dir: dir.to_string(),
                reason: format!("bad size {:?} in {:?}", fields[4], trimmed),
            })?;

        record.insert(
            name,
            TapeEntry {
                size,
                status: DmStatus::from_code(fields[7]),
            },
        );
    }

    Ok(record)
}

/// Split a listing line into its eight leading columns and the file name
fn split_listing_line(line: &str) -> Option<([&str; 8], &str)> {
    let mut fields = [""; 8];
    let mut rest = line.trim_start();
    for slot in fields.iter_mut() {
        let end = rest.find(char::is_whitespace)?;
        *slot = &rest[..end];
        rest = rest[end..].trim_start();
    }
    let name = rest.trim_end();
    if name.is_empty() {
        return None;
    }
    Some((fields, name))
}
