// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Batch scheduler interface
//!
//! The [`Scheduler`] trait is the seam between the reconciliation logic and
//! the real queue. [`PbsScheduler`] drives PBS through `qsub` and `qstat`.

use std::collections::HashSet;
use std::path::Path;
use std::process::Command;

use crate::command::run_command;
use crate::config::{Programs, ResourceProfile};
use crate::error::{MigrateError, Result};

/// One request to run a step script under the scheduler
#[derive(Debug, Clone)]
pub struct Submission<'a> {
    /// Job name; also the filter used to find our jobs in the queue
    pub name: &'a str,
    /// Directory the job runs in (holds the script snapshot)
    pub work_dir: &'a Path,
    /// Script file name, relative to `work_dir`
    pub script: &'a str,
    /// Project charged for the job
    pub project: &'a str,
    pub resources: &'a ResourceProfile,
    /// Arguments passed through to the script
    pub job_args: &'a [String],
}

/// External batch queue
pub trait Scheduler {
    /// Ids of queued or running jobs whose listing mentions `name`
    fn active_jobs(&self, name: &str) -> Result<HashSet<String>>;

    /// Submit a job and return the id the scheduler assigned
    fn submit(&self, submission: &Submission<'_>) -> Result<String>;
}

/// PBS scheduler driven through its command-line tools
pub struct PbsScheduler {
    qsub: String,
    qstat: String,
    user: String,
}

impl PbsScheduler {
    pub fn new(programs: &Programs, user: String) -> Self {
        Self {
            qsub: programs.qsub.clone(),
            qstat: programs.qstat.clone(),
            user,
        }
    }
}

impl Scheduler for PbsScheduler {
    fn active_jobs(&self, name: &str) -> Result<HashSet<String>> {
        let output = run_command(
            Command::new(&self.qstat).args(["-u", self.user.as_str()]),
            None,
        )?;
        Ok(parse_qstat(&output, name))
    }

    fn submit(&self, submission: &Submission<'_>) -> Result<String> {
        let output = run_command(
            Command::new(&self.qsub)
                .args(qsub_args(submission))
                .current_dir(submission.work_dir),
            None,
        )?;

        let job_id = output.trim();
        if job_id.is_empty() {
            return Err(MigrateError::EmptyJobId(submission.name.to_string()));
        }
        Ok(job_id.to_string())
    }
}

/// Build the `qsub` argument list for a submission
///
/// Scheduler stdout/stderr land in the job's working directory.
pub fn qsub_args(submission: &Submission<'_>) -> Vec<String> {
    let resources = submission.resources;
    let mut args: Vec<String> = vec![
        "-N".into(),
        submission.name.into(),
        "-e".into(),
        "stderr".into(),
        "-o".into(),
        "stdout".into(),
        "-l".into(),
        "wd".into(),
        "-q".into(),
        resources.queue.clone(),
        "-P".into(),
        submission.project.into(),
        "-l".into(),
        format!("mem={}", resources.memory),
        "-l".into(),
        format!("walltime={}", resources.walltime),
    ];
    if !resources.other.is_empty() {
        args.push("-l".into());
        args.push(format!("other={}", resources.other));
    }
    args.push("--".into());
    args.push("bash".into());
    args.push(submission.script.into());
    args.extend(submission.job_args.iter().cloned());
    args
}

/// Extract job ids from `qstat -u` output
///
/// Every line mentioning `name` contributes its first column. Header lines
/// never contain a step name, so they drop out naturally.
pub fn parse_qstat(output: &str, name: &str) -> HashSet<String> {
    output
        .lines()
        .filter(|line| line.contains(name))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}
