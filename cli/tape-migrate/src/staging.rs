// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Batched staging of archived files to the fast tier
//!
//! Retrieval targets that only live on tape are collected per archive
//! project under one byte budget, then recalled with a single request per
//! project. Requests go out only when the queue is already full, so tape
//! mounts are batched instead of racing the submissions they would feed.

use std::collections::BTreeMap;

use crate::admission::Admission;
use crate::archive::Archive;
use crate::error::Result;
use crate::tape::TapeCache;

#[derive(Debug)]
pub struct StagingPlanner {
    budget: u64,
    pending: u64,
    batches: BTreeMap<String, Vec<String>>,
}

impl StagingPlanner {
    /// `budget` bounds the total bytes pending across all projects
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            pending: 0,
            batches: BTreeMap::new(),
        }
    }

    /// Queue `path` for staging if it fits in the remaining budget
    pub fn offer(&mut self, cache: &mut TapeCache<'_>, path: &str, project: &str) -> Result<bool> {
        let size = cache.size(path, project)?;
        if self.pending.saturating_add(size) >= self.budget {
            tracing::debug!(path, project, size, pending = self.pending, "Over staging budget");
            return Ok(false);
        }

        self.pending += size;
        self.batches
            .entry(project.to_string())
            .or_default()
            .push(path.to_string());
        Ok(true)
    }

    /// Issue one stage request per project, if the queue is saturated
    ///
    /// Returns the number of requests made. With spare capacity nothing is
    /// sent: this pass already had better work to submit.
    pub fn flush(&mut self, archive: &dyn Archive, admission: &Admission) -> Result<usize> {
        if self.batches.is_empty() {
            return Ok(0);
        }
        if admission.has_capacity() {
            tracing::debug!(
                files = self.pending_files(),
                bytes = self.pending,
                "Queue has capacity; not staging"
            );
            return Ok(0);
        }

        let mut requests = 0;
        for (project, paths) in &self.batches {
            archive.stage(project, paths)?;
            requests += 1;
            tracing::info!(project = %project, files = paths.len(), "Requested staging");
        }
        Ok(requests)
    }

    pub fn pending_bytes(&self) -> u64 {
        self.pending
    }

    pub fn pending_files(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    /// Paths queued for `project`, in the order they were offered
    pub fn batch(&self, project: &str) -> &[String] {
        self.batches.get(project).map(Vec::as_slice).unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;

    use super::*;
    use crate::archive::{DmStatus, TapeEntry, TapeRecord};
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct StubArchive {
        staged: RefCell<Vec<(String, Vec<String>)>>,
    }

    impl Archive for StubArchive {
        fn list(&self, _dir: &str, _project: &str) -> Result<TapeRecord> {
            let mut record = TapeRecord::new();
            for (name, size) in [("a.cram", 600), ("b.cram", 300), ("c.cram", 5000)] {
                record.insert(
                    name,
                    TapeEntry {
                        size,
                        status: DmStatus::Offline,
                    },
                );
            }
            Ok(record)
        }

        fn stage(&self, project: &str, paths: &[String]) -> Result<()> {
            self.staged
                .borrow_mut()
                .push((project.to_string(), paths.to_vec()));
            Ok(())
        }
    }

    fn full_queue() -> Admission {
        Admission::new(HashSet::from(["1.pbs".to_string()]), 1)
    }

    #[test]
    fn test_budget_is_exclusive() {
        let archive = StubArchive::default();
        let mut cache = TapeCache::new(&archive);
        let mut planner = StagingPlanner::new(900);

        assert!(planner.offer(&mut cache, "r/a.cram", "wq2").unwrap());
        // 600 + 300 == 900 does not fit.
        assert!(!planner.offer(&mut cache, "r/b.cram", "wq2").unwrap());
        assert_eq!(planner.pending_bytes(), 600);
        assert_eq!(planner.pending_files(), 1);
    }

    #[test]
    fn test_flush_one_request_per_project() {
        let archive = StubArchive::default();
        let mut cache = TapeCache::new(&archive);
        let mut planner = StagingPlanner::new(2000);

        planner.offer(&mut cache, "r/b.cram", "wq2").unwrap();
        planner.offer(&mut cache, "r/a.cram", "tx70").unwrap();
        planner.offer(&mut cache, "r/a.cram", "wq2").unwrap();
        assert!(!planner.offer(&mut cache, "r/c.cram", "wq2").unwrap());

        assert_eq!(planner.flush(&archive, &full_queue()).unwrap(), 2);
        assert_eq!(
            archive.staged.borrow().as_slice(),
            &[
                ("tx70".to_string(), vec!["r/a.cram".to_string()]),
                (
                    "wq2".to_string(),
                    vec!["r/b.cram".to_string(), "r/a.cram".to_string()]
                ),
            ]
        );
    }

    #[test]
    fn test_flush_waits_for_saturation() {
        let archive = StubArchive::default();
        let mut cache = TapeCache::new(&archive);
        let mut planner = StagingPlanner::new(2000);
        planner.offer(&mut cache, "r/a.cram", "wq2").unwrap();

        let idle = Admission::new(HashSet::new(), 1);
        assert_eq!(planner.flush(&archive, &idle).unwrap(), 0);
        assert!(archive.staged.borrow().is_empty());
        assert_eq!(planner.batch("wq2"), ["r/a.cram".to_string()]);
    }

    #[test]
    fn test_empty_flush_is_noop() {
        let archive = StubArchive::default();
        let mut planner = StagingPlanner::new(2000);
        assert_eq!(planner.flush(&archive, &full_queue()).unwrap(), 0);
        assert!(planner.batch("wq2").is_empty());
    }
}
