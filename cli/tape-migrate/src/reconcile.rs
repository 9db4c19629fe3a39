// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! One reconciliation pass per invocation
//!
//! A pass parses every record, builds its job, and only then talks to the
//! scheduler, so bad input never causes a partial pass. Jobs are handled
//! in input order and never depend on one another.

use std::fmt;

use crate::admission::Admission;
use crate::archive::Archive;
use crate::config::MigrateConfig;
use crate::error::Result;
use crate::job::{ArchiveJob, RetrieveJob, parse_records};
use crate::scheduler::Scheduler;
use crate::staging::StagingPlanner;
use crate::step::StepKind;
use crate::tape::TapeCache;

/// Counters for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub jobs: usize,
    /// New scheduler submissions
    pub submitted: usize,
    /// Jobs that got their completion marker this pass
    pub completed: usize,
    /// Steps that left the queue without a success artifact
    pub suspect: usize,
    /// Files and bytes covered by stage requests actually sent
    pub staged_files: usize,
    pub staged_bytes: u64,
    pub stage_requests: usize,
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} jobs, {} submitted, {} completed, {} suspect, {} staged ({} bytes, {} requests)",
            self.jobs,
            self.submitted,
            self.completed,
            self.suspect,
            self.staged_files,
            self.staged_bytes,
            self.stage_requests
        )
    }
}

/// Knobs for a retrieval pass
#[derive(Debug, Clone, Copy)]
pub struct GetOptions {
    /// Admission ceiling for `mdss_get` jobs
    pub limit: usize,
    /// Byte budget for files pending staging
    pub staging_limit: u64,
    /// Also compare the retrieved file's size with the archive's
    pub verify_size: bool,
}

/// Archive pass: submit puts, then retire sources that reached tape
pub fn run_put_pass(
    input: &str,
    config: &MigrateConfig,
    limit: usize,
    scheduler: &dyn Scheduler,
    archive: &dyn Archive,
) -> Result<PassReport> {
    let records = parse_records(input, StepKind::Put)?;
    let mut jobs = records
        .iter()
        .map(|record| ArchiveJob::new(record, config))
        .collect::<Result<Vec<_>>>()?;

    let mut admission = Admission::seed(scheduler, StepKind::Put.name(), limit)?;
    let mut cache = TapeCache::new(archive);
    let mut report = PassReport {
        jobs: jobs.len(),
        ..PassReport::default()
    };

    for job in jobs.iter_mut().filter(|job| !job.is_complete()) {
        if admission.has_capacity() {
            job.put_mut().start(&mut admission, scheduler)?;
        }
    }

    for job in jobs.iter_mut() {
        if job.is_complete() {
            // Marker written but the source survived, e.g. a failed unlink.
            if job.source().exists() {
                tracing::warn!(
                    source = %job.source().display(),
                    dest = job.dest(),
                    "Archived source still present; re-verifying before removal"
                );
                job.finalize(&mut cache)?;
            }
            continue;
        }

        if job.put_mut().done(&admission)? {
            if job.finalize(&mut cache)? {
                report.completed += 1;
            }
        } else if job.put().suspect_failed() {
            report.suspect += 1;
        }
    }

    report.submitted = admission.submitted();
    tracing::info!(
        step = StepKind::Put.name(),
        listings = cache.cached(),
        running = admission.running(),
        ceiling = admission.ceiling(),
        "Pass finished: {}",
        report
    );
    Ok(report)
}

/// Retrieval pass: finish gets, start the ones readable now, stage the rest
pub fn run_get_pass(
    input: &str,
    config: &MigrateConfig,
    options: GetOptions,
    scheduler: &dyn Scheduler,
    archive: &dyn Archive,
) -> Result<PassReport> {
    let records = parse_records(input, StepKind::Get)?;
    let mut jobs = records
        .iter()
        .map(|record| RetrieveJob::new(record, config))
        .collect::<Result<Vec<_>>>()?;

    let mut admission = Admission::seed(scheduler, StepKind::Get.name(), options.limit)?;
    let mut cache = TapeCache::new(archive);
    let mut planner = StagingPlanner::new(options.staging_limit);
    let mut report = PassReport {
        jobs: jobs.len(),
        ..PassReport::default()
    };

    for job in jobs
        .iter_mut()
        .filter(|job| !job.is_complete() && job.get().started())
    {
        if job.get_mut().done(&admission)? {
            job.finalize(&mut cache, options.verify_size)?;
            report.completed += 1;
        } else if job.get().suspect_failed() {
            report.suspect += 1;
        }
    }

    for job in jobs
        .iter_mut()
        .filter(|job| !job.is_complete() && !job.get().started())
    {
        let path = job.archive_path().to_string();
        let project = job.archive_project().to_string();

        if cache.on_fast_tier(&path, &project)? {
            if admission.has_capacity() {
                job.get_mut().start(&mut admission, scheduler)?;
            }
        } else if !planner.offer(&mut cache, &path, &project)? {
            tracing::debug!(path = %path, project = %project, "Deferred staging to a later pass");
        }
    }

    report.stage_requests = planner.flush(archive, &admission)?;
    if report.stage_requests > 0 {
        report.staged_files = planner.pending_files();
        report.staged_bytes = planner.pending_bytes();
    }

    report.submitted = admission.submitted();
    tracing::info!(
        step = StepKind::Get.name(),
        listings = cache.cached(),
        running = admission.running(),
        ceiling = admission.ceiling(),
        "Pass finished: {}",
        report
    );
    Ok(report)
}
