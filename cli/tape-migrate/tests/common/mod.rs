// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Test helpers for tape-migrate integration tests
//!
//! In-memory stand-ins for PBS and mdss, plus a scratch workspace with the
//! two job scripts in place.

// Allow unused code - not every test binary uses every helper
#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use tape_migrate::archive::{Archive, DmStatus, TapeEntry, TapeRecord};
use tape_migrate::config::MigrateConfig;
use tape_migrate::error::{MigrateError, Result};
use tape_migrate::scheduler::{Scheduler, Submission};
use tape_migrate::tape::split_archive_path;
use tempfile::TempDir;

// ============================================================================
// Fake scheduler
// ============================================================================

/// What the fake scheduler saw for one submission
#[derive(Debug, Clone)]
pub struct Submitted {
    pub job_id: String,
    pub name: String,
    pub work_dir: PathBuf,
    pub script: String,
    pub project: String,
    pub job_args: Vec<String>,
}

/// Queue held in memory; jobs stay active until [`FakeScheduler::finish`]
#[derive(Default)]
pub struct FakeScheduler {
    /// job id -> job name
    active: RefCell<BTreeMap<String, String>>,
    pub submissions: RefCell<Vec<Submitted>>,
    pub queries: Cell<usize>,
    pub fail_submit: Cell<bool>,
}

impl FakeScheduler {
    /// Put a job this tool did not submit into the queue
    pub fn enqueue(&self, job_id: &str, name: &str) {
        self.active
            .borrow_mut()
            .insert(job_id.to_string(), name.to_string());
    }

    /// Take a job out of the queue, leaving the success artifact if asked
    pub fn finish(&self, job_id: &str, success: bool) {
        self.active.borrow_mut().remove(job_id);
        if success {
            let submissions = self.submissions.borrow();
            let sub = submissions
                .iter()
                .find(|s| s.job_id == job_id)
                .expect("unknown job id");
            std::fs::write(sub.work_dir.join(format!("{}.ok", sub.script)), "").unwrap();
        }
    }

    pub fn submitted(&self) -> usize {
        self.submissions.borrow().len()
    }

    pub fn last_job_id(&self) -> String {
        self.submissions
            .borrow()
            .last()
            .expect("nothing submitted")
            .job_id
            .clone()
    }
}

impl Scheduler for FakeScheduler {
    fn active_jobs(&self, name: &str) -> Result<HashSet<String>> {
        self.queries.set(self.queries.get() + 1);
        Ok(self
            .active
            .borrow()
            .iter()
            .filter(|(_, n)| n.as_str() == name)
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn submit(&self, submission: &Submission<'_>) -> Result<String> {
        if self.fail_submit.get() {
            return Err(MigrateError::CommandFailed {
                program: "qsub".to_string(),
                status: "exit status: 38".to_string(),
                stderr: "qsub: would exceed queue generic's per-user limit".to_string(),
            });
        }

        let mut submissions = self.submissions.borrow_mut();
        let job_id = format!("{}.fake-pbs", submissions.len() + 1);
        submissions.push(Submitted {
            job_id: job_id.clone(),
            name: submission.name.to_string(),
            work_dir: submission.work_dir.to_path_buf(),
            script: submission.script.to_string(),
            project: submission.project.to_string(),
            job_args: submission.job_args.to_vec(),
        });
        self.enqueue(&job_id, submission.name);
        Ok(job_id)
    }
}

// ============================================================================
// Fake archive
// ============================================================================

/// Archive contents held in memory, keyed by (dir, project)
#[derive(Default)]
pub struct FakeArchive {
    dirs: RefCell<HashMap<(String, String), TapeRecord>>,
    pub lists: Cell<usize>,
    pub staged: RefCell<Vec<(String, Vec<String>)>>,
}

impl FakeArchive {
    pub fn set(&self, project: &str, path: &str, size: u64, status: DmStatus) {
        let (dir, name) = split_archive_path(path);
        self.dirs
            .borrow_mut()
            .entry((dir.to_string(), project.to_string()))
            .or_default()
            .insert(name, TapeEntry { size, status });
    }
}

impl Archive for FakeArchive {
    fn list(&self, dir: &str, project: &str) -> Result<TapeRecord> {
        self.lists.set(self.lists.get() + 1);
        Ok(self
            .dirs
            .borrow()
            .get(&(dir.to_string(), project.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn stage(&self, project: &str, paths: &[String]) -> Result<()> {
        self.staged
            .borrow_mut()
            .push((project.to_string(), paths.to_vec()));
        Ok(())
    }
}

// ============================================================================
// Scratch workspace
// ============================================================================

/// Temporary directory with scripts, a work dir and room for data files
pub struct Workspace {
    pub dir: TempDir,
    pub config: MigrateConfig,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        std::fs::write(
            scripts.join("mdss_put.pbs.sh"),
            "mdss -P \"$3\" put \"$1\" \"$2\" && touch mdss_put.pbs.sh.ok\n",
        )
        .unwrap();
        std::fs::write(
            scripts.join("mdss_get.pbs.sh"),
            "mdss -P \"$3\" get \"$1\" \"$2\" && touch mdss_get.pbs.sh.ok\n",
        )
        .unwrap();

        let config = MigrateConfig {
            work_dir: dir.path().join("run"),
            script_dir: scripts,
            ..MigrateConfig::default()
        };
        Self { dir, config }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create a local file of `size` bytes and return its absolute path
    pub fn file(&self, rel: &str, size: usize) -> String {
        let path = self.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, vec![b'x'; size]).unwrap();
        path.to_string_lossy().into_owned()
    }
}
