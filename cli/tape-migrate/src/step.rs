// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Step state machine
//!
//! A [`Step`] is one scheduler job run on behalf of one transfer. It moves
//! `NotStarted -> Submitting -> Started(id) -> Done`, persisting every
//! transition before acting on it:
//!
//! - `Submitting` is written before `qsub` runs, so an interrupted pass can
//!   never lead to a second submission.
//! - `Done` is written only after the job has left the queue and its script
//!   dropped `<script>.ok` in the step's work directory.
//!
//! A job that leaves the queue without that artifact is *suspect*: it is
//! reported once and left alone until an operator intervenes.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::admission::Admission;
use crate::config::ResourceProfile;
use crate::error::{MigrateError, Result};
use crate::scheduler::{Scheduler, Submission};
use crate::state::{StateFile, StepState};

/// The operations a job can schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StepKind {
    /// Copy a local file into the archive
    Put,
    /// Copy an archived file back to local disk
    Get,
}

impl StepKind {
    /// Scheduler job name, also used to filter the queue
    pub fn name(self) -> &'static str {
        match self {
            Self::Put => "mdss_put",
            Self::Get => "mdss_get",
        }
    }

    /// Script run by the scheduler job
    pub fn script(self) -> &'static str {
        match self {
            Self::Put => "mdss_put.pbs.sh",
            Self::Get => "mdss_get.pbs.sh",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One schedulable operation for one job
#[derive(Debug)]
pub struct Step {
    kind: StepKind,
    script: PathBuf,
    project: String,
    resources: ResourceProfile,
    job_args: Vec<String>,
    job_dir: PathBuf,
    state_file: StateFile,
    state: StepState,
    suspect: bool,
}

impl Step {
    /// Build a step and load its persisted state from `job_dir`
    pub fn new(
        kind: StepKind,
        script_dir: &Path,
        project: String,
        resources: ResourceProfile,
        job_args: Vec<String>,
        job_dir: PathBuf,
    ) -> Result<Self> {
        let state_file = StateFile::new(&job_dir);
        let state = state_file.step(kind.name())?;
        Ok(Self {
            kind,
            script: script_dir.join(kind.script()),
            project,
            resources,
            job_args,
            job_dir,
            state_file,
            state,
            suspect: false,
        })
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn state(&self) -> &StepState {
        &self.state
    }

    pub fn job_args(&self) -> &[String] {
        &self.job_args
    }

    /// Directory the scheduler job runs in
    pub fn work_dir(&self) -> PathBuf {
        self.job_dir.join(self.kind.name())
    }

    /// File whose presence means the job script finished successfully
    pub fn success_artifact(&self) -> PathBuf {
        self.work_dir().join(format!("{}.ok", self.kind.script()))
    }

    pub fn started(&self) -> bool {
        self.state.is_started()
    }

    /// Set when the last [`Step::done`] found the job gone without success
    pub fn suspect_failed(&self) -> bool {
        self.suspect
    }

    /// Reconcile with the queue and report whether the step is done
    ///
    /// A started step whose job id is no longer active is promoted to
    /// `Done` if its success artifact exists. Otherwise it is flagged as
    /// suspect and a warning is logged, once per step per process.
    pub fn done(&mut self, admission: &Admission) -> Result<bool> {
        let job_id = match &self.state {
            StepState::Done { .. } => return Ok(true),
            StepState::NotStarted => return Ok(false),
            StepState::Submitting => None,
            StepState::Started { job_id } => Some(job_id.clone()),
        };

        if let Some(id) = &job_id {
            if admission.is_active(id) {
                return Ok(false);
            }
        }

        if self.success_artifact().exists() {
            self.transition(StepState::Done {
                job_id: job_id.clone(),
            })?;
            self.suspect = false;
            tracing::debug!(
                step = self.name(),
                work_dir = %self.work_dir().display(),
                job_id = job_id.as_deref().unwrap_or("-"),
                "Step finished"
            );
            return Ok(true);
        }

        if !self.suspect {
            self.suspect = true;
            match &job_id {
                Some(id) => tracing::warn!(
                    step = self.name(),
                    work_dir = %self.work_dir().display(),
                    job_id = %id,
                    "Job left the queue without a success artifact; job failed?"
                ),
                None => tracing::warn!(
                    step = self.name(),
                    work_dir = %self.work_dir().display(),
                    "Submission was interrupted before a job id was recorded; check the queue"
                ),
            }
        }
        Ok(false)
    }

    /// Submit the step if it has never been submitted
    ///
    /// Returns whether a new submission happened. The caller is responsible
    /// for checking admission capacity first.
    pub fn start(&mut self, admission: &mut Admission, scheduler: &dyn Scheduler) -> Result<bool> {
        if self.done(admission)? || self.started() {
            return Ok(false);
        }

        let work_dir = self.work_dir();
        std::fs::create_dir_all(&work_dir).map_err(|e| MigrateError::io(&work_dir, e))?;

        // Snapshot the script so later edits cannot change a queued job.
        let script_name = self.kind.script();
        let snapshot = work_dir.join(script_name);
        std::fs::copy(&self.script, &snapshot).map_err(|e| MigrateError::io(&self.script, e))?;

        self.transition(StepState::Submitting)?;

        let job_id = scheduler.submit(&Submission {
            name: self.kind.name(),
            work_dir: &work_dir,
            script: script_name,
            project: &self.project,
            resources: &self.resources,
            job_args: &self.job_args,
        })?;

        self.transition(StepState::Started {
            job_id: job_id.clone(),
        })?;
        admission.register(job_id.clone());

        tracing::info!(
            step = self.name(),
            work_dir = %work_dir.display(),
            job_id = %job_id,
            "Submitted"
        );
        Ok(true)
    }

    fn transition(&mut self, next: StepState) -> Result<()> {
        self.state_file.store_step(self.kind.name(), &next)?;
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;

    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::{TempDir, tempdir};

    #[derive(Default)]
    struct RecordingScheduler {
        submitted: RefCell<Vec<(PathBuf, String, Vec<String>)>>,
        fail: bool,
    }

    impl Scheduler for RecordingScheduler {
        fn active_jobs(&self, _name: &str) -> Result<HashSet<String>> {
            Ok(HashSet::new())
        }

        fn submit(&self, submission: &Submission<'_>) -> Result<String> {
            if self.fail {
                return Err(MigrateError::CommandFailed {
                    program: "qsub".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "qsub: Job rejected".to_string(),
                });
            }
            let mut submitted = self.submitted.borrow_mut();
            submitted.push((
                submission.work_dir.to_path_buf(),
                submission.project.to_string(),
                submission.job_args.to_vec(),
            ));
            Ok(format!("{}.gadi-pbs", 100 + submitted.len()))
        }
    }

    fn put_step(dir: &TempDir) -> Step {
        let scripts = dir.path().join("scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        std::fs::write(scripts.join("mdss_put.pbs.sh"), "mdss put \"$1\" \"$2\"\n").unwrap();

        Step::new(
            StepKind::Put,
            &scripts,
            "projX".to_string(),
            ResourceProfile::default(),
            vec!["data/a.cram".into(), "dest/a.cram".into(), "projX".into()],
            dir.path().join("run").join("a.cram"),
        )
        .unwrap()
    }

    #[test]
    fn test_start_submits_once() {
        let dir = tempdir().unwrap();
        let scheduler = RecordingScheduler::default();
        let mut admission = Admission::new(HashSet::new(), 5);
        let mut step = put_step(&dir);

        assert!(!step.started());
        assert!(step.start(&mut admission, &scheduler).unwrap());
        assert!(step.started());
        assert_eq!(
            step.state(),
            &StepState::Started {
                job_id: "101.gadi-pbs".to_string()
            }
        );
        assert!(admission.is_active("101.gadi-pbs"));

        // Script snapshot sits next to where the job runs.
        assert!(step.work_dir().join("mdss_put.pbs.sh").exists());

        // A second call is a no-op.
        assert!(!step.start(&mut admission, &scheduler).unwrap());
        assert_eq!(scheduler.submitted.borrow().len(), 1);

        let (work_dir, project, args) = scheduler.submitted.borrow()[0].clone();
        assert_eq!(work_dir, step.work_dir());
        assert_eq!(project, "projX");
        assert_eq!(args, step.job_args());
    }

    #[test]
    fn test_state_survives_reload() {
        let dir = tempdir().unwrap();
        let scheduler = RecordingScheduler::default();
        let mut admission = Admission::new(HashSet::new(), 5);
        put_step(&dir).start(&mut admission, &scheduler).unwrap();

        let reloaded = put_step(&dir);
        assert_eq!(reloaded.state().job_id(), Some("101.gadi-pbs"));
    }

    #[test]
    fn test_failed_submission_leaves_submitting() {
        let dir = tempdir().unwrap();
        let scheduler = RecordingScheduler {
            fail: true,
            ..Default::default()
        };
        let mut admission = Admission::new(HashSet::new(), 5);
        let mut step = put_step(&dir);

        let err = step.start(&mut admission, &scheduler).unwrap_err();
        assert!(matches!(err, MigrateError::CommandFailed { .. }));
        assert_eq!(step.state(), &StepState::Submitting);
        assert_eq!(admission.submitted(), 0);

        // Never resubmitted once the intent is on disk.
        let ok_scheduler = RecordingScheduler::default();
        let mut reloaded = put_step(&dir);
        assert!(!reloaded.start(&mut admission, &ok_scheduler).unwrap());
        assert!(ok_scheduler.submitted.borrow().is_empty());
        assert!(reloaded.suspect_failed());
    }

    #[test]
    fn test_done_waits_while_queued() {
        let dir = tempdir().unwrap();
        let scheduler = RecordingScheduler::default();
        let mut admission = Admission::new(HashSet::new(), 5);
        let mut step = put_step(&dir);
        step.start(&mut admission, &scheduler).unwrap();

        // Even with the artifact present, a queued job is not done.
        std::fs::write(step.success_artifact(), "").unwrap();
        assert!(!step.done(&admission).unwrap());
        assert!(!step.suspect_failed());
    }

    #[test]
    fn test_done_after_job_leaves_queue() {
        let dir = tempdir().unwrap();
        let scheduler = RecordingScheduler::default();
        let mut admission = Admission::new(HashSet::new(), 5);
        put_step(&dir).start(&mut admission, &scheduler).unwrap();

        let empty_queue = Admission::new(HashSet::new(), 5);
        let mut step = put_step(&dir);
        std::fs::write(step.success_artifact(), "").unwrap();

        assert!(step.done(&empty_queue).unwrap());
        assert_eq!(
            step.state(),
            &StepState::Done {
                job_id: Some("101.gadi-pbs".to_string())
            }
        );

        // Done is sticky even if the artifact disappears.
        std::fs::remove_file(step.success_artifact()).unwrap();
        assert!(put_step(&dir).done(&empty_queue).unwrap());
    }

    #[test]
    fn test_vanished_job_is_suspect_not_retried() {
        let dir = tempdir().unwrap();
        let scheduler = RecordingScheduler::default();
        let mut admission = Admission::new(HashSet::new(), 5);
        put_step(&dir).start(&mut admission, &scheduler).unwrap();

        let mut empty_queue = Admission::new(HashSet::new(), 5);
        let mut step = put_step(&dir);
        assert!(!step.done(&empty_queue).unwrap());
        assert!(step.suspect_failed());

        assert!(!step.start(&mut empty_queue, &scheduler).unwrap());
        assert_eq!(scheduler.submitted.borrow().len(), 1);
        assert!(step.state().is_started());
    }

    #[test]
    fn test_missing_script_is_error() {
        let dir = tempdir().unwrap();
        let scheduler = RecordingScheduler::default();
        let mut admission = Admission::new(HashSet::new(), 5);
        let mut step = Step::new(
            StepKind::Get,
            &dir.path().join("no-scripts"),
            "wq2".to_string(),
            ResourceProfile::default(),
            vec![],
            dir.path().join("run").join("x"),
        )
        .unwrap();

        let err = step.start(&mut admission, &scheduler).unwrap_err();
        assert!(matches!(err, MigrateError::Io { .. }));
        assert!(scheduler.submitted.borrow().is_empty());
        assert_eq!(step.state(), &StepState::NotStarted);
    }
}
