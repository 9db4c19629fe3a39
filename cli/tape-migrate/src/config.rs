// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Configuration for tape-migrate
//!
//! Defaults match the NCI copyq setup the tool was written for. Any field
//! can be overridden from a JSON file (see [`MigrateConfig::from_file`]);
//! the CLI then applies its own flags and environment variables on top.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default directory holding per-job state, relative to the PWD
const DEFAULT_WORK_DIR: &str = "run";

/// Resources requested for every scheduler submission
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResourceProfile {
    /// Queue class (`qsub -q`)
    pub queue: String,
    /// Memory request (`-l mem=`)
    pub memory: String,
    /// Walltime limit (`-l walltime=`)
    pub walltime: String,
    /// Filesystem dependency declarations (`-l other=`); empty to omit
    pub other: String,
    /// Charge every submission to this project instead of the job's own
    pub project: Option<String>,
}

impl Default for ResourceProfile {
    fn default() -> Self {
        Self {
            queue: "copyq".to_string(),
            memory: "2GB".to_string(),
            walltime: "10:00:00".to_string(),
            other: "gdata2:gdata3:mdss".to_string(),
            project: None,
        }
    }
}

/// Names (or paths) of the external programs the tool drives
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Programs {
    pub qsub: String,
    pub qstat: String,
    pub mdss: String,
    pub xargs: String,
}

impl Default for Programs {
    fn default() -> Self {
        Self {
            qsub: "qsub".to_string(),
            qstat: "qstat".to_string(),
            mdss: "mdss".to_string(),
            xargs: "xargs".to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Directory holding one working directory per job
    pub work_dir: PathBuf,
    /// Directory containing `mdss_put.pbs.sh` and `mdss_get.pbs.sh`
    pub script_dir: PathBuf,
    /// User whose queue is inspected; falls back to `$USER`
    pub user: Option<String>,
    pub resources: ResourceProfile,
    pub programs: Programs,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            script_dir: PathBuf::from("."),
            user: None,
            resources: ResourceProfile::default(),
            programs: Programs::default(),
        }
    }
}

impl MigrateConfig {
    /// Load configuration from a JSON file
    ///
    /// Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// The user whose queued jobs seed admission control
    pub fn queue_user(&self) -> Result<String> {
        match &self.user {
            Some(user) => Ok(user.clone()),
            None => std::env::var("USER")
                .context("USER is not set; pass --user to choose whose queue to inspect"),
        }
    }
}
