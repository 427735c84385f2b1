// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Link tooling for the shell `PATH` and Git worktrees.
//!
//! Two small command line tools are built on top of this library:
//!
//! - __wt__: clone repositories into a worktree friendly layout, add
//!   worktrees, and share untracked files between them.
//! - __bunscript__: scaffold small scripts, and link or unlink them into a bin
//!   directory on the user's `PATH`.
//!
//! Both tools rely on the same [link reconciliation](link) procedure to
//! create links without ever clobbering files they do not own.

pub mod config;
pub mod link;
pub mod manifest;
pub mod path;
pub mod script;
pub mod syscall;
pub mod worktree;
