// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Admission control for scheduler submissions
//!
//! An [`Admission`] is seeded once per pass from a fresh queue snapshot and
//! threaded through the reconciliation loop. It answers two questions:
//! may another job be submitted, and is a given job id still in the queue.
//! Jobs over the ceiling are simply left for the next invocation.

use std::collections::HashSet;

use crate::error::Result;
use crate::scheduler::Scheduler;

/// Per-pass submission gate for one direction
#[derive(Debug, Clone)]
pub struct Admission {
    active: HashSet<String>,
    running: usize,
    ceiling: usize,
    submitted: usize,
}

impl Admission {
    /// Create from a known set of active job ids
    pub fn new(active: HashSet<String>, ceiling: usize) -> Self {
        Self {
            running: active.len(),
            active,
            ceiling,
            submitted: 0,
        }
    }

    /// Query the scheduler for jobs named `name` and seed from them
    pub fn seed(scheduler: &dyn Scheduler, name: &str, ceiling: usize) -> Result<Self> {
        let active = scheduler.active_jobs(name)?;
        tracing::info!(
            step = name,
            running = active.len(),
            ceiling,
            "Seeded admission from queue"
        );
        Ok(Self::new(active, ceiling))
    }

    /// Whether one more submission fits under the ceiling
    pub fn has_capacity(&self) -> bool {
        self.running < self.ceiling
    }

    /// Whether `job_id` was in the queue snapshot or submitted this pass
    pub fn is_active(&self, job_id: &str) -> bool {
        self.active.contains(job_id)
    }

    /// Record a submission made during this pass
    pub fn register(&mut self, job_id: String) {
        if self.active.insert(job_id) {
            self.running += 1;
        }
        self.submitted += 1;
    }

    /// Jobs counted against the ceiling
    pub fn running(&self) -> usize {
        self.running
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Submissions made during this pass
    pub fn submitted(&self) -> usize {
        self.submitted
    }
}
