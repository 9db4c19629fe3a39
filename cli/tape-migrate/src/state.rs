// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Durable per-job state
//!
//! Each job's working directory holds one `state.json` mapping step names
//! to their [`StepState`]. Every update rewrites the whole record through a
//! temporary file and an atomic rename, so a crash leaves either the old or
//! the new record, never a torn one.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{MigrateError, Result};

/// File name of the per-job state record
pub const STATE_FILE_NAME: &str = "state.json";

/// Progress of one step of one job
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StepState {
    /// Nothing has been attempted
    #[default]
    NotStarted,
    /// Recorded immediately before submission; no job id was captured
    ///
    /// Seeing this on a later pass means the tool stopped mid-submission.
    /// The step is never resubmitted from here.
    Submitting,
    /// Submitted and holding the scheduler's job id
    Started { job_id: String },
    /// The job left the queue and its success artifact was found
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<String>,
    },
}

impl StepState {
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Started { job_id } => Some(job_id),
            Self::Done { job_id } => job_id.as_deref(),
            Self::NotStarted | Self::Submitting => None,
        }
    }

    pub fn is_started(&self) -> bool {
        !matches!(self, Self::NotStarted)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Submitting => write!(f, "submitting"),
            Self::Started { job_id } => write!(f, "started({})", job_id),
            Self::Done { .. } => write!(f, "done"),
        }
    }
}

/// Everything persisted for one job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(default)]
    pub steps: BTreeMap<String, StepState>,
}

/// Location of a job's state record
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(job_dir: &Path) -> Self {
        Self {
            path: job_dir.join(STATE_FILE_NAME),
        }
    }

    /// Read the record; a missing file is an empty record
    pub fn load(&self) -> Result<JobRecord> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(JobRecord::default());
            }
            Err(e) => return Err(MigrateError::io(&self.path, e)),
        };

        serde_json::from_str(&content).map_err(|source| MigrateError::StateRecord {
            path: self.path.clone(),
            source,
        })
    }

    /// Current state of step `name`
    pub fn step(&self, name: &str) -> Result<StepState> {
        Ok(self.load()?.steps.remove(name).unwrap_or_default())
    }

    /// Replace the state of step `name`, leaving other steps untouched
    pub fn store_step(&self, name: &str, state: &StepState) -> Result<()> {
        let mut record = self.load()?;
        record.steps.insert(name.to_string(), state.clone());
        self.store(&record)
    }

    pub fn store(&self, record: &JobRecord) -> Result<()> {
        let mut content =
            serde_json::to_vec_pretty(record).map_err(|source| MigrateError::StateRecord {
                path: self.path.clone(),
                source,
            })?;
        content.push(b'\n');
        write_atomic(&self.path, &content)
    }
}

/// Write `contents` to `path` via a sibling temp file and rename
///
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| MigrateError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| MigrateError::io(dir, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| MigrateError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| MigrateError::io(path, e.error))?;
    Ok(())
}
