// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process invocation.
//!
//! Every call blocks until the external process exits. Failure is detected
//! through exit status alone. The working directory of each call is given
//! explicitly, the working directory of our own process is never changed.

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::{Command, ExitStatus},
};
use tracing::{debug, instrument};

/// Run external command attached to current terminal.
///
/// # Errors
///
/// - Return [`SyscallError::Spawn`] if command cannot be started.
/// - Return [`SyscallError::Failed`] if command exits unsuccessfully.
#[instrument(skip(cmd, args, cwd), level = "debug")]
pub fn syscall_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    cwd: impl AsRef<Path>,
) -> Result<()> {
    let command = command_line(cmd.as_ref(), args);
    debug!("exec: {command:?}");

    let status = Command::new(cmd.as_ref())
        .args(&command[1..])
        .current_dir(cwd.as_ref())
        .status()
        .map_err(|err| SyscallError::Spawn {
            source: err,
            command: display_command(&command),
        })?;

    if !status.success() {
        return Err(SyscallError::Failed {
            command: display_command(&command),
            status,
            stderr: String::new(),
        });
    }

    Ok(())
}

/// Run external command with its output captured.
///
/// Returns standard output with trailing newlines chomped. Standard error is
/// carried inside [`SyscallError::Failed`] when the command fails.
///
/// # Errors
///
/// - Return [`SyscallError::Spawn`] if command cannot be started.
/// - Return [`SyscallError::Failed`] if command exits unsuccessfully.
#[instrument(skip(cmd, args, cwd), level = "debug")]
pub fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    cwd: impl AsRef<Path>,
) -> Result<String> {
    let command = command_line(cmd.as_ref(), args);
    debug!("exec (capture): {command:?}");

    let output = Command::new(cmd.as_ref())
        .args(&command[1..])
        .current_dir(cwd.as_ref())
        .output()
        .map_err(|err| SyscallError::Spawn {
            source: err,
            command: display_command(&command),
        })?;
    let stdout = chomp(String::from_utf8_lossy(output.stdout.as_slice()).into_owned());
    let stderr = chomp(String::from_utf8_lossy(output.stderr.as_slice()).into_owned());

    if !output.status.success() {
        return Err(SyscallError::Failed {
            command: display_command(&command),
            status: output.status,
            stderr,
        });
    }

    Ok(stdout)
}

fn command_line(
    cmd: &OsStr,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Vec<OsString> {
    let mut line = vec![cmd.to_os_string()];
    line.extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
    line
}

fn display_command(line: &[OsString]) -> String {
    line.iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

// INVARIANT: Chomp trailing newlines.
fn chomp(message: String) -> String {
    message.trim_end_matches(['\r', '\n']).to_string()
}

/// External process error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Command cannot be started at all.
    #[error("failed to run {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Command ran but exited unsuccessfully.
    #[error("command {command:?} failed ({status}){}", failure_detail(stderr))]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

fn failure_detail(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(":\n{stderr}")
    }
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;
