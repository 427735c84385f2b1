// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Worktree workspace representation.
//!
//! A __workspace__ is a directory holding a bare clone of a repository next to
//! one worktree per checked out branch.
//!
//! # Workspace Layout
//!
//! ```text
//! repo/
//! ├── .bare/       # bare clone, shared history store of every worktree
//! ├── .git         # file containing "gitdir: ./.bare"
//! ├── .wt          # workspace configuration
//! ├── main/        # worktree of the base branch
//! └── feature/x/   # worktree of branch "feature/x"
//! ```
//!
//! Every worktree lives at the workspace root joined with its branch name.
//! The `.git` file at the root lets plain Git commands run from the root
//! itself, while the `.wt` file marks the root for discovery.
//!
//! # Shared Files
//!
//! Untracked files like `.env` tend to be needed in every worktree. The
//! workspace configuration records them as shared files, which get replayed
//! into every newly added worktree. See [`share`] for details.
//!
//! # See Also
//!
//! 1. [`WtConfig`]
//! 2. [`clone`]
//! 3. [`share`]

pub mod clone;
pub mod share;

use crate::{
    config::{ConfigError, SharedFile, WtConfig, CONFIG_FILE},
    link::{LinkError, LinkReport},
};

use git2::{Branch, BranchType, ErrorCode, Repository, WorktreeAddOptions};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Directory name of bare clone inside workspace root.
pub const BARE_DIR: &str = ".bare";

/// Workspace of worktrees sharing one bare clone.
pub struct Workspace {
    root: PathBuf,
    repository: Repository,
    config: WtConfig,
}

impl Workspace {
    /// Open existing workspace at its root.
    ///
    /// # Errors
    ///
    /// - Return [`WorktreeError::Io`] if configuration cannot be read.
    /// - Return [`WorktreeError::Config`] if configuration is malformed.
    /// - Return [`WorktreeError::Git2`] if bare clone cannot be opened.
    #[instrument(skip(root), level = "debug")]
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        debug!("open workspace: {:?}", root.display());
        let config_path = root.join(CONFIG_FILE);
        let config = read_to_string(&config_path)
            .map_err(|err| WorktreeError::Io {
                source: err,
                path: config_path.clone(),
            })?
            .parse()?;
        let repository = Repository::open_bare(root.join(BARE_DIR))?;

        Ok(Self {
            root,
            repository,
            config,
        })
    }

    /// Find workspace that contains given path.
    ///
    /// Walks up from `start` until a directory containing a `.wt` file is
    /// found.
    ///
    /// # Errors
    ///
    /// - Return [`WorktreeError::NotAWorkspace`] if no ancestor is a
    ///   workspace root.
    /// - Return any error of [`Workspace::open`].
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let start = start.as_ref();
        match start
            .ancestors()
            .find(|dir| dir.join(CONFIG_FILE).is_file())
        {
            Some(root) => Self::open(root),
            None => Err(WorktreeError::NotAWorkspace(start.into())),
        }
    }

    /// Path to workspace root.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Current workspace configuration.
    pub fn config(&self) -> &WtConfig {
        &self.config
    }

    /// Path that worktree of given branch lives at.
    pub fn worktree_path(&self, branch: impl AsRef<str>) -> PathBuf {
        self.root.join(branch.as_ref())
    }

    /// Determine worktree that contains given path.
    ///
    /// # Errors
    ///
    /// - Return [`WorktreeError::NotInWorktree`] if path is not inside a
    ///   worktree of this workspace.
    pub fn current_worktree(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let not_in_worktree = || WorktreeError::NotInWorktree(path.into());
        let repository = Repository::discover(path).map_err(|_| not_in_worktree())?;
        let workdir = repository.workdir().ok_or_else(not_in_worktree)?;
        if !workdir.starts_with(&self.root) {
            return Err(not_in_worktree());
        }

        Ok(workdir.to_path_buf())
    }

    /// Add worktree for branch and replay shared files into it.
    ///
    /// If the branch does not exist yet, then it gets created from `base`, or
    /// from the configured base branch when `base` is not given. Shared files
    /// that cannot be replayed do not undo the new worktree, they are listed
    /// in the returned report instead.
    ///
    /// # Errors
    ///
    /// - Return [`WorktreeError::WorktreeExists`] if worktree path is taken.
    /// - Return [`WorktreeError::Git2`] if branch or worktree creation fails.
    /// - Return [`WorktreeError::Share`] if shared files cannot be replayed.
    #[instrument(skip(self), level = "debug")]
    pub fn add_worktree(
        &self,
        branch: &str,
        base: Option<&str>,
    ) -> Result<(PathBuf, LinkReport)> {
        let path = self.worktree_path(branch);
        if path.exists() {
            return Err(WorktreeError::WorktreeExists(path));
        }

        let local = match self.repository.find_branch(branch, BranchType::Local) {
            Ok(local) => local,
            Err(err) if err.code() == ErrorCode::NotFound => {
                let base = base.unwrap_or(self.config.base_branch.as_str());
                info!("create branch {branch} from {base}");
                let commit = self
                    .repository
                    .find_branch(base, BranchType::Local)?
                    .get()
                    .peel_to_commit()?;
                self.repository.branch(branch, &commit, false)?
            }
            Err(err) => return Err(err.into()),
        };

        add_worktree_at(&self.repository, branch, local, &path)?;
        let report = self.replay_shared(&path)?;

        Ok((path, report))
    }

    /// Share files into worktree.
    ///
    /// With an empty listing every configured shared file gets replayed.
    /// Otherwise only the given entries are applied, and unless `once` is
    /// set, they are persisted into the configuration for future worktrees.
    ///
    /// # Errors
    ///
    /// - Return [`WorktreeError::Share`] if entries cannot be applied.
    /// - Return [`WorktreeError::Io`] if configuration cannot be written.
    #[instrument(skip(self, entries, worktree), level = "debug")]
    pub fn share(
        &mut self,
        entries: Vec<(String, SharedFile)>,
        worktree: impl AsRef<Path>,
        once: bool,
    ) -> Result<LinkReport> {
        let worktree = worktree.as_ref();
        if entries.is_empty() {
            return self.replay_shared(worktree);
        }

        let mut report = LinkReport::default();
        for (dest, shared) in &entries {
            let outcome = share::apply(&self.root, worktree, dest, shared)?;
            report.record(dest.as_str(), outcome);
        }

        if !once {
            self.config.shared_files.extend(entries);
            self.save_config()?;
        }

        Ok(report)
    }

    fn replay_shared(&self, worktree: &Path) -> Result<LinkReport> {
        let mut report = LinkReport::default();
        for (dest, shared) in &self.config.shared_files {
            let outcome = share::apply(&self.root, worktree, dest, shared)?;
            report.record(dest.as_str(), outcome);
        }

        Ok(report)
    }

    fn save_config(&self) -> Result<()> {
        write_config(&self.root, &self.config)
    }
}

pub(crate) fn write_config(root: &Path, config: &WtConfig) -> Result<()> {
    let path = root.join(CONFIG_FILE);
    write(&path, config.to_string()).map_err(|err| WorktreeError::Io {
        source: err,
        path,
    })
}

/// Add worktree of local branch at target path.
///
/// Branch names may contain slashes, so the worktree administrative name has
/// them replaced with dashes.
pub(crate) fn add_worktree_at(
    repository: &Repository,
    branch: &str,
    local: Branch<'_>,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        mkdirp::mkdirp(parent).map_err(|err| WorktreeError::Io {
            source: err,
            path: parent.into(),
        })?;
    }

    let name = branch.replace('/', "-");
    let reference = local.into_reference();
    let mut opts = WorktreeAddOptions::new();
    opts.reference(Some(&reference));
    repository.worktree(&name, path, Some(&opts))?;
    info!("add worktree {} for {branch}", path.display());

    Ok(())
}

/// Workspace error types.
#[derive(Debug, thiserror::Error)]
pub enum WorktreeError {
    /// No workspace root above given path.
    #[error("not inside a wt workspace: {:?}", .0.display())]
    NotAWorkspace(PathBuf),

    /// Path is not inside a worktree.
    #[error("not inside a worktree: {:?}", .0.display())]
    NotInWorktree(PathBuf),

    /// Worktree path is already taken.
    #[error("worktree path already exists: {:?}", .0.display())]
    WorktreeExists(PathBuf),

    /// Clone destination already holds content.
    #[error("destination already exists and is not empty: {:?}", .0.display())]
    DestinationNotEmpty(PathBuf),

    /// Neither main nor master exist after cloning.
    #[error("no main or master branch found in {0}")]
    NoDefaultBranch(String),

    /// Shared file destination escapes the worktree.
    #[error("destination must be a relative path inside the worktree: {0:?}")]
    InvalidDestination(String),

    /// File system access fails.
    #[error("failed to access {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration parsing fails.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Link reconciliation fails.
    #[error(transparent)]
    Share(#[from] LinkError),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = WorktreeError> = std::result::Result<T, E>;
