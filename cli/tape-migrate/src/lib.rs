// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Tape Migration Library
//!
//! Drives bulk copies between local disk and the mdss tape archive by
//! submitting PBS jobs, one file per job. Each invocation is a single
//! reconciliation pass over the job list; progress is kept on disk so
//! the tool can be rerun from cron until everything converges.
//!
//! # Modules
//!
//! - [`admission`] - Per-pass ceiling on queued scheduler jobs
//! - [`archive`] - Archive trait, `dmls -l` parsing, mdss client
//! - [`config`] - Resource profile, program names, directories
//! - [`job`] - Input records and the archive/retrieve jobs built from them
//! - [`reconcile`] - The put and get passes
//! - [`scheduler`] - Scheduler trait and PBS client
//! - [`staging`] - Batched recall of tape-only files
//! - [`state`] - Per-job `state.json` record
//! - [`step`] - Step state machine
//! - [`tape`] - Per-pass cache of archive listings

pub mod admission;
pub mod archive;
pub mod command;
pub mod config;
pub mod error;
pub mod job;
pub mod reconcile;
pub mod scheduler;
pub mod staging;
pub mod state;
pub mod step;
pub mod tape;

pub use error::{MigrateError, Result};
