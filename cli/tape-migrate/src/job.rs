// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Transfer jobs and their input records
//!
//! Jobs are rebuilt from the input on every invocation. All progress lives
//! on disk: the per-job state record under the work directory, plus a
//! completion marker once every postcondition has been verified.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::config::MigrateConfig;
use crate::error::{MigrateError, Result};
use crate::state::write_atomic;
use crate::step::{Step, StepKind};
use crate::tape::{TapeCache, split_archive_path};

/// Suffix of the marker left next to an archived (and deleted) source
pub const ARCHIVED_SUFFIX: &str = ".mdssok";

/// Name of the completion marker inside a retrieval job's directory
pub const RETRIEVED_MARKER: &str = "complete";

/// One tab-separated input line, already validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based line number in the input
    pub line: usize,
    pub fields: Vec<String>,
}

/// Parse job descriptors for `kind`
///
/// Blank lines are skipped. Every other line must have the field count the
/// direction expects (3 for put, 3 or 4 for get) and no field may be empty
/// or contain whitespace.
pub fn parse_records(input: &str, kind: StepKind) -> Result<Vec<Record>> {
    let allowed: &[usize] = match kind {
        StepKind::Put => &[3],
        StepKind::Get => &[3, 4],
    };

    let mut records = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        let line = idx + 1;
        let raw = raw.trim_end_matches('\r');
        if raw.trim().is_empty() {
            continue;
        }

        let fields: Vec<String> = raw.split('\t').map(str::to_string).collect();
        if !allowed.contains(&fields.len()) {
            let expected = match kind {
                StepKind::Put => "3",
                StepKind::Get => "3 or 4",
            };
            return Err(MigrateError::MalformedRecord {
                line,
                reason: format!(
                    "expected {} tab-separated fields, found {}",
                    expected,
                    fields.len()
                ),
            });
        }

        if let Some((pos, field)) = fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.is_empty() || f.contains(char::is_whitespace))
        {
            return Err(MigrateError::MalformedRecord {
                line,
                reason: format!(
                    "field {} ({:?}) is empty or contains whitespace",
                    pos + 1,
                    field
                ),
            });
        }

        records.push(Record { line, fields });
    }

    Ok(records)
}

/// Working directory for a job: `<work_dir>/<basename>-<hash>`
///
/// The hash of the job's identity keeps jobs with the same file name apart.
pub fn job_dir(work_dir: &Path, basename: &str, identity: &str) -> PathBuf {
    let digest = Sha256::digest(identity.as_bytes());
    let short: String = digest[..4].iter().map(|b| format!("{:02x}", b)).collect();
    work_dir.join(format!("{}-{}", basename, short))
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| MigrateError::InvalidJob(format!("{} has no file name", path.display())))
}

/// Archive direction: copy a local file to tape, then delete it
#[derive(Debug)]
pub struct ArchiveJob {
    source: PathBuf,
    dest: String,
    project: String,
    job_dir: PathBuf,
    put: Step,
}

impl ArchiveJob {
    /// Build from a `source \t dest \t project` record
    ///
    /// Fails if the source is gone but the job was never completed, which
    /// means something outside this tool touched the file.
    pub fn new(record: &Record, config: &MigrateConfig) -> Result<Self> {
        let [source, dest, project] = record.fields.as_slice() else {
            return Err(MigrateError::MalformedRecord {
                line: record.line,
                reason: format!("expected 3 fields, found {}", record.fields.len()),
            });
        };

        let source = PathBuf::from(source);
        let identity = source.to_string_lossy().into_owned();
        let job_dir = job_dir(&config.work_dir, &file_name_of(&source)?, &identity);
        let submit_project = config
            .resources
            .project
            .clone()
            .unwrap_or_else(|| project.clone());

        let put = Step::new(
            StepKind::Put,
            &config.script_dir,
            submit_project,
            config.resources.clone(),
            vec![identity, dest.clone(), project.clone()],
            job_dir.clone(),
        )?;

        let job = Self {
            source,
            dest: dest.clone(),
            project: project.clone(),
            job_dir,
            put,
        };

        if !job.source.exists() && !job.is_complete() {
            return Err(MigrateError::InvalidJob(format!(
                "line {}: source {} does not exist and was never archived",
                record.line,
                job.source.display()
            )));
        }

        Ok(job)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Archive-relative destination path
    pub fn dest(&self) -> &str {
        &self.dest
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    pub fn put(&self) -> &Step {
        &self.put
    }

    pub fn put_mut(&mut self) -> &mut Step {
        &mut self.put
    }

    /// `<source>.mdssok`, holding the destination path
    pub fn completion_marker(&self) -> PathBuf {
        let mut marker: OsString = self.source.clone().into_os_string();
        marker.push(ARCHIVED_SUFFIX);
        PathBuf::from(marker)
    }

    pub fn is_complete(&self) -> bool {
        self.completion_marker().exists()
    }

    /// Verify the copy on tape and retire the source
    ///
    /// Call only once the put step is done. Returns `false` while the
    /// destination has not yet reached tape. A size disagreement is fatal
    /// and leaves the source in place.
    pub fn finalize(&self, cache: &mut TapeCache<'_>) -> Result<bool> {
        if !cache.on_tape(&self.dest, &self.project)? {
            tracing::debug!(dest = %self.dest, "Destination not on tape yet");
            return Ok(false);
        }

        let archived = cache.size(&self.dest, &self.project)?;
        let local = std::fs::metadata(&self.source)
            .map_err(|e| MigrateError::io(&self.source, e))?
            .len();
        if archived != local {
            return Err(MigrateError::SizeMismatch {
                path: self.dest.clone(),
                archived,
                local,
            });
        }

        write_atomic(&self.completion_marker(), format!("{}\n", self.dest).as_bytes())?;
        std::fs::remove_file(&self.source).map_err(|e| MigrateError::io(&self.source, e))?;

        tracing::info!(source = %self.source.display(), dest = %self.dest, "Archived");
        Ok(true)
    }
}

/// Retrieval direction: copy an archived file back to local disk
#[derive(Debug)]
pub struct RetrieveJob {
    archive_path: String,
    dest_file: PathBuf,
    archive_project: String,
    job_project: String,
    job_dir: PathBuf,
    get: Step,
}

impl RetrieveJob {
    /// Build from an `archive_path \t dest_dir \t archive_project [\t job_project]` record
    pub fn new(record: &Record, config: &MigrateConfig) -> Result<Self> {
        let (archive_path, dest_dir, archive_project, job_project) = match record.fields.as_slice()
        {
            [a, d, p] => (a, d, p, p),
            [a, d, p, j] => (a, d, p, j),
            other => {
                return Err(MigrateError::MalformedRecord {
                    line: record.line,
                    reason: format!("expected 3 or 4 fields, found {}", other.len()),
                });
            }
        };

        if archive_path.starts_with('/') {
            return Err(MigrateError::InvalidJob(format!(
                "line {}: archive path {} must be relative",
                record.line, archive_path
            )));
        }

        let dest_dir = PathBuf::from(dest_dir);
        if !dest_dir.is_absolute() {
            return Err(MigrateError::InvalidJob(format!(
                "line {}: destination directory {} must be absolute",
                record.line,
                dest_dir.display()
            )));
        }
        if dest_dir.exists() && !dest_dir.is_dir() {
            return Err(MigrateError::InvalidJob(format!(
                "line {}: destination {} exists and is not a directory",
                record.line,
                dest_dir.display()
            )));
        }

        let (_, basename) = split_archive_path(archive_path);
        let dest_file = dest_dir.join(basename);
        let identity = format!("{}\t{}", archive_path, dest_dir.display());
        let job_dir = job_dir(&config.work_dir, basename, &identity);

        let get = Step::new(
            StepKind::Get,
            &config.script_dir,
            config
                .resources
                .project
                .clone()
                .unwrap_or_else(|| job_project.clone()),
            config.resources.clone(),
            vec![
                archive_path.clone(),
                dest_file.to_string_lossy().into_owned(),
                archive_project.clone(),
            ],
            job_dir.clone(),
        )?;

        Ok(Self {
            archive_path: archive_path.clone(),
            dest_file,
            archive_project: archive_project.clone(),
            job_project: job_project.clone(),
            job_dir,
            get,
        })
    }

    pub fn archive_path(&self) -> &str {
        &self.archive_path
    }

    /// Local file the archived file is copied to
    pub fn dest_file(&self) -> &Path {
        &self.dest_file
    }

    pub fn archive_project(&self) -> &str {
        &self.archive_project
    }

    /// Project charged for the scheduler job
    pub fn job_project(&self) -> &str {
        &self.job_project
    }

    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    pub fn get(&self) -> &Step {
        &self.get
    }

    pub fn get_mut(&mut self) -> &mut Step {
        &mut self.get
    }

    pub fn completion_marker(&self) -> PathBuf {
        self.job_dir.join(RETRIEVED_MARKER)
    }

    pub fn is_complete(&self) -> bool {
        self.completion_marker().exists()
    }

    /// Check the retrieved file and record completion
    ///
    /// Call only once the get step is done. With `verify_size` the local
    /// size must also match what the archive recorded.
    pub fn finalize(&self, cache: &mut TapeCache<'_>, verify_size: bool) -> Result<()> {
        if !self.dest_file.exists() {
            return Err(MigrateError::MissingDestination(self.dest_file.clone()));
        }

        if verify_size {
            let archived = cache.size(&self.archive_path, &self.archive_project)?;
            let local = std::fs::metadata(&self.dest_file)
                .map_err(|e| MigrateError::io(&self.dest_file, e))?
                .len();
            if archived != local {
                return Err(MigrateError::SizeMismatch {
                    path: self.dest_file.display().to_string(),
                    archived,
                    local,
                });
            }
        }

        write_atomic(
            &self.completion_marker(),
            format!("{}\n", self.dest_file.display()).as_bytes(),
        )?;

        tracing::info!(
            archive_path = %self.archive_path,
            dest = %self.dest_file.display(),
            "Retrieved"
        );
        Ok(())
    }
}
