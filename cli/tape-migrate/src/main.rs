// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! tape-migrate CLI
//!
//! Runs one put or get pass over a list of tab-separated job records read
//! from a file or stdin. Meant to be rerun periodically until every job
//! has its completion marker.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tape_migrate::archive::MdssArchive;
use tape_migrate::config::MigrateConfig;
use tape_migrate::reconcile::{GetOptions, run_get_pass, run_put_pass};
use tape_migrate::scheduler::PbsScheduler;

#[derive(Parser)]
#[command(name = "tape-migrate")]
#[command(about = "Move files to and from the mdss tape archive via PBS", long_about = None)]
#[command(version)]
struct Cli {
    /// Trace every external command
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file
    #[arg(long, global = true, env = "TAPE_MIGRATE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding per-job state [default: run]
    #[arg(long, global = true, env = "TAPE_MIGRATE_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Directory containing mdss_put.pbs.sh and mdss_get.pbs.sh [default: .]
    #[arg(long, global = true, env = "TAPE_MIGRATE_SCRIPT_DIR")]
    script_dir: Option<PathBuf>,

    /// User whose queued jobs count against the limit [default: $USER]
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive local files: source_path, dest_path, project
    Put {
        /// Maximum number of queued mdss_put jobs
        #[arg(long, default_value_t = 1)]
        put_lim: usize,

        /// Job list; stdin if absent or "-"
        input: Option<PathBuf>,
    },

    /// Retrieve archived files: archive_path, dest_dir, archive_project [, job_project]
    Get {
        /// Maximum number of queued mdss_get jobs
        #[arg(long, default_value_t = 1)]
        get_lim: usize,

        /// Byte budget for files waiting to be staged from tape
        #[arg(long, default_value_t = 1)]
        staging_lim: u64,

        /// Require the retrieved size to match the archive's
        #[arg(long)]
        verify_size: bool,

        /// Job list; stdin if absent or "-"
        input: Option<PathBuf>,
    },
}

impl Cli {
    fn load_config(&self) -> Result<MigrateConfig> {
        let mut config = match &self.config {
            Some(path) => MigrateConfig::from_file(path)?,
            None => MigrateConfig::default(),
        };

        if let Some(dir) = &self.work_dir {
            config.work_dir = dir.clone();
        }
        if let Some(dir) = &self.script_dir {
            config.script_dir = dir.clone();
        }
        if let Some(user) = &self.user {
            config.user = Some(user.clone());
        }
        Ok(config)
    }
}

fn read_input(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) if path.as_path() != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job list: {}", path.display())),
        _ => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read job list from stdin")?;
            Ok(content)
        }
    }
}

/// `RUST_LOG` or `tape_migrate=info`; `--verbose` always adds debug for this crate
fn log_filter(verbose: bool) -> Result<EnvFilter> {
    let filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "tape_migrate=info".to_string()),
    );
    if !verbose {
        return Ok(filter);
    }
    Ok(filter.add_directive(
        "tape_migrate=debug"
            .parse()
            .context("Invalid log directive")?,
    ))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose)?)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.load_config()?;

    match &cli.command {
        Commands::Put { put_lim, input } => {
            let input = read_input(input.as_ref())?;
            let scheduler = PbsScheduler::new(&config.programs, config.queue_user()?);
            let archive = MdssArchive::new(&config.programs);
            run_put_pass(&input, &config, *put_lim, &scheduler, &archive)
                .context("Put pass failed")?;
        }
        Commands::Get {
            get_lim,
            staging_lim,
            verify_size,
            input,
        } => {
            let input = read_input(input.as_ref())?;
            let scheduler = PbsScheduler::new(&config.programs, config.queue_user()?);
            let archive = MdssArchive::new(&config.programs);
            let options = GetOptions {
                limit: *get_lim,
                staging_limit: *staging_lim,
                verify_size: *verify_size,
            };
            run_get_pass(&input, &config, options, &scheduler, &archive)
                .context("Get pass failed")?;
        }
    }

    Ok(())
}
