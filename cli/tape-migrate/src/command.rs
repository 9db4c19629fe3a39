// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Blocking execution of external commands
//!
//! Every call to the scheduler or the archive goes through [`run_command`],
//! which logs the full invocation at debug level (shown with `--verbose`)
//! and turns a non-zero exit into [`MigrateError::CommandFailed`].

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::{MigrateError, Result};

/// Run `command` to completion and return its stdout
///
/// If `input` is given it is written to the child's stdin, which is then
/// closed. Stderr is captured and reported only on failure.
pub fn run_command(command: &mut Command, input: Option<&[u8]>) -> Result<String> {
    let program = command.get_program().to_string_lossy().into_owned();

    tracing::debug!(
        command = ?command,
        cwd = ?command.get_current_dir(),
        stdin_bytes = input.map_or(0, <[u8]>::len),
        "Running external command"
    );

    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|source| MigrateError::Spawn {
        program: program.clone(),
        source,
    })?;

    // Stdin is fed from its own thread while wait_with_output drains stdout
    // and stderr, so a child that writes before reading cannot wedge us.
    let stdin = child.stdin.take();
    let (output, written) = std::thread::scope(|scope| {
        let writer = match (input, stdin) {
            (Some(bytes), Some(mut stdin)) => {
                // Dropping the handle closes the pipe so the child sees EOF.
                Some(scope.spawn(move || stdin.write_all(bytes)))
            }
            _ => None,
        };
        let output = child.wait_with_output();
        let written = match writer {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked"))),
            None => Ok(()),
        };
        (output, written)
    });

    let output = output.map_err(|source| MigrateError::Spawn {
        program: program.clone(),
        source,
    })?;
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        return Err(MigrateError::CommandFailed {
            program,
            status: output.status.to_string(),
            stderr,
        });
    }

    if let Err(e) = written {
        return Err(MigrateError::CommandFailed {
            program,
            status: format!("{}, stdin not fully consumed ({})", output.status, e),
            stderr,
        });
    }

    String::from_utf8(output.stdout).map_err(|_| MigrateError::NonUtf8Output(program))
}
