// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Error types for tape-migrate

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that abort a reconciliation pass
///
/// Every variant is fatal: the pass stops and on-disk state is left as it
/// was before the failing step, so the next invocation can pick up again.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// An input line did not have the expected shape
    #[error("Malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// A job failed its construction-time sanity checks
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// An external command could not be spawned
    #[error("Failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external command exited unsuccessfully
    #[error("Command `{program}` failed ({status}): {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// An external command wrote something other than UTF-8 to stdout
    #[error("Command `{0}` produced non-UTF-8 output")]
    NonUtf8Output(String),

    /// The scheduler accepted a submission but printed no job id
    #[error("Submission of {0} returned an empty job id")]
    EmptyJobId(String),

    /// The archive listing did not look like `dmls -l` output
    #[error("Unexpected archive listing for {dir}: {reason}")]
    UnexpectedListing { dir: String, reason: String },

    /// A path was expected in the archive but is not listed there
    #[error("{path} is not listed in the archive (project {project})")]
    NotListed { path: String, project: String },

    /// Archive-recorded size disagrees with the local file
    #[error("Size mismatch for {path}: archive has {archived} bytes, local file has {local} bytes")]
    SizeMismatch {
        path: String,
        archived: u64,
        local: u64,
    },

    /// A retrieval step reported success but the file is not on disk
    #[error("Destination {} missing after retrieval completed", .0.display())]
    MissingDestination(PathBuf),

    /// A job state record could not be decoded or encoded
    #[error("Bad state record {}: {source}", .path.display())]
    StateRecord {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem error on a specific path
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigrateError {
    /// Wrap an IO error with the path it happened on
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        MigrateError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T, E = MigrateError> = std::result::Result<T, E>;
