// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Workspace cloning.
//!
//! Clone a remote repository straight into the workspace layout: a bare clone
//! at `.bare`, a `.git` file pointing at it, a worktree for the base branch,
//! and a fresh `.wt` configuration.
//!
//! The base branch is `main` if it exists, `master` otherwise. A repository
//! with neither is refused after cloning, since there is nothing sensible to
//! branch new worktrees off from.

use crate::{
    config::WtConfig,
    worktree::{add_worktree_at, write_config, Result, Workspace, WorktreeError, BARE_DIR},
};

use auth_git2::{GitAuthenticator, Prompter};
use git2::{build::RepoBuilder, BranchType, Config, FetchOptions, RemoteCallbacks, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    fs::{read_dir, write},
    path::{Path, PathBuf},
    time,
};
use tracing::{info, instrument};

/// Branches considered as base branch, in order of preference.
pub const BASE_BRANCH_CANDIDATES: [&str; 2] = ["main", "master"];

/// Refspec configured for the origin remote of the bare clone.
pub const FETCH_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";

/// Derive repository name from clone URL.
///
/// Takes the last path segment of the URL with any trailing slash and `.git`
/// extension removed. Works for both URL and scp-like syntax.
pub fn repo_name_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':', '\\']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);

    match name {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// Clone remote repository into a new workspace.
///
/// The progress of the clone is displayed through a progress bar. If any
/// credentials are required, then the user is prompted for them, blocking the
/// progress bar for user input.
///
/// # Errors
///
/// - Return [`WorktreeError::DestinationNotEmpty`] if destination holds
///   content already.
/// - Return [`WorktreeError::NoDefaultBranch`] if neither main nor master
///   exist after cloning.
/// - Return [`WorktreeError::Git2`] if libgit2 operations fail.
/// - Return [`WorktreeError::Io`] if workspace files cannot be written.
#[instrument(skip(url, dest, bar), level = "debug")]
pub fn clone_workspace(
    url: impl AsRef<str>,
    dest: impl Into<PathBuf>,
    bar: ProgressBar,
) -> Result<Workspace> {
    let (url, dest) = (url.as_ref(), dest.into());
    ensure_empty_dir(&dest)?;
    info!("clone {url} into {}", dest.display());

    let repository = clone_bare(url, dest.join(BARE_DIR), bar)?;
    write(dest.join(".git"), format!("gitdir: ./{BARE_DIR}\n")).map_err(|err| {
        WorktreeError::Io {
            source: err,
            path: dest.join(".git"),
        }
    })?;
    repository
        .config()?
        .set_str("remote.origin.fetch", FETCH_REFSPEC)?;

    let base = find_base_branch(&repository)?
        .ok_or_else(|| WorktreeError::NoDefaultBranch(url.into()))?;
    let local = repository.find_branch(&base, BranchType::Local)?;
    add_worktree_at(&repository, &base, local, &dest.join(&base))?;
    write_config(&dest, &WtConfig::new(base))?;

    Workspace::open(dest)
}

/// Determine base branch of a fresh clone.
///
/// If the preferred branch only exists as a remote tracking branch, then a
/// local branch tracking it gets created.
///
/// # Errors
///
/// - Return [`WorktreeError::Git2`] if branch lookup or creation fails.
pub fn find_base_branch(repository: &Repository) -> Result<Option<String>> {
    for name in BASE_BRANCH_CANDIDATES {
        if repository.find_branch(name, BranchType::Local).is_ok() {
            return Ok(Some(name.into()));
        }

        let upstream = format!("origin/{name}");
        if let Ok(remote) = repository.find_branch(&upstream, BranchType::Remote) {
            let commit = remote.get().peel_to_commit()?;
            let mut local = repository.branch(name, &commit, false)?;
            local.set_upstream(Some(&upstream))?;
            return Ok(Some(name.into()));
        }
    }

    Ok(None)
}

fn ensure_empty_dir(dest: &Path) -> Result<()> {
    let io_err = |err| WorktreeError::Io {
        source: err,
        path: dest.into(),
    };

    if dest.exists() {
        if read_dir(dest).map_err(io_err)?.next().is_some() {
            return Err(WorktreeError::DestinationNotEmpty(dest.into()));
        }

        return Ok(());
    }

    mkdirp::mkdirp(dest).map_err(io_err)?;

    Ok(())
}

fn clone_bare(url: &str, path: PathBuf, bar: ProgressBar) -> Result<Repository> {
    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
    )?
    .progress_chars("-Cco.");
    bar.set_style(style);
    bar.set_message(url.to_string());
    bar.enable_steady_tick(time::Duration::from_millis(100));

    let prompter = IndicatifPrompter::new(bar);
    let authenticator = GitAuthenticator::default().set_prompter(prompter.clone());
    let config = Config::open_default()?;

    let mut throttle = time::Instant::now();
    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(&config));
    rc.transfer_progress(|progress| {
        let stats = progress.to_owned();
        let bar_size = stats.total_objects() as u64;
        let bar_pos = stats.received_objects() as u64;
        if throttle.elapsed() > time::Duration::from_millis(10) {
            throttle = time::Instant::now();
            prompter.bar.set_length(bar_size);
            prompter.bar.set_position(bar_pos);
        }
        true
    });

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(rc);
    let repository = RepoBuilder::new()
        .bare(true)
        .fetch_options(fo)
        .clone(url, &path)?;
    prompter.bar.finish_and_clear();

    Ok(repository)
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::fs::read_to_string;
    use tempfile::TempDir;

    #[test_case("https://github.com/awkless/binkit.git", Some("binkit"); "https")]
    #[test_case("git@github.com:awkless/binkit.git", Some("binkit"); "scp like")]
    #[test_case("git@github.com:binkit", Some("binkit"); "scp without path")]
    #[test_case("/srv/git/binkit/", Some("binkit"); "local path")]
    #[test_case("https://example.com/", Some("example.com"); "host only")]
    #[test_case("", None; "empty")]
    #[test_case(".git", None; "extension only")]
    #[test]
    fn derive_repo_name(url: &str, expect: Option<&str>) {
        pretty_assertions::assert_eq!(repo_name_from_url(url).as_deref(), expect);
    }

    #[test]
    fn clone_refuses_non_empty_destination() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let dest = tmp.path().join("repo");
        std::fs::create_dir_all(&dest)?;
        std::fs::write(dest.join("precious"), "data")?;

        let result = clone_workspace("/does/not/matter", &dest, ProgressBar::hidden());
        assert!(matches!(result, Err(WorktreeError::DestinationNotEmpty(_))));
        assert_eq!(read_to_string(dest.join("precious"))?, "data");

        Ok(())
    }
}
