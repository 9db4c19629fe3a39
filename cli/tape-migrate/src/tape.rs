// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Per-pass cache of archive directory listings
//!
//! Listing a directory on the archive is slow and loads the HSM, so each
//! `(directory, project)` pair is queried at most once per invocation.
//! There is no eviction: a pass is short-lived and directories are assumed
//! not to change underneath it. A long-running caller would need explicit
//! invalidation.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::archive::{Archive, TapeRecord};
use crate::error::{MigrateError, Result};

/// Memoizing front end to an [`Archive`]
pub struct TapeCache<'a> {
    archive: &'a dyn Archive,
    records: HashMap<(String, String), TapeRecord>,
}

impl<'a> TapeCache<'a> {
    pub fn new(archive: &'a dyn Archive) -> Self {
        Self {
            archive,
            records: HashMap::new(),
        }
    }

    /// Listing of `dir` as seen by `project`, fetched on first use
    pub fn record(&mut self, dir: &str, project: &str) -> Result<&TapeRecord> {
        match self.records.entry((dir.to_string(), project.to_string())) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let record = self.archive.list(dir, project)?;
                tracing::debug!(dir, project, files = record.len(), "Cached archive listing");
                Ok(entry.insert(record))
            }
        }
    }

    /// Whether the archive file at `path` has been written to tape
    pub fn on_tape(&mut self, path: &str, project: &str) -> Result<bool> {
        let (dir, name) = split_archive_path(path);
        Ok(self.record(dir, project)?.on_tape(name))
    }

    /// Whether the archive file at `path` is readable without a tape mount
    pub fn on_fast_tier(&mut self, path: &str, project: &str) -> Result<bool> {
        let (dir, name) = split_archive_path(path);
        Ok(self.record(dir, project)?.on_fast_tier(name))
    }

    /// Recorded size of the archive file at `path`
    ///
    /// A path missing from its directory listing is an error: every caller
    /// asks about a file it expects to be there.
    pub fn size(&mut self, path: &str, project: &str) -> Result<u64> {
        let (dir, name) = split_archive_path(path);
        self.record(dir, project)?
            .size(name)
            .ok_or_else(|| MigrateError::NotListed {
                path: path.to_string(),
                project: project.to_string(),
            })
    }

    /// Number of distinct listings fetched so far
    pub fn cached(&self) -> usize {
        self.records.len()
    }
}

/// Split an archive path into (directory, file name)
///
/// A bare file name lives in the project's top-level directory, `.`.
pub fn split_archive_path(path: &str) -> (&str, &str) {
    let path = path.trim_end_matches('/');
    match path.rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => (".", path),
    }
}
