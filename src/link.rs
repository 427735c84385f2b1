// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Link reconciliation.
//!
//! Make the symlinks inside a bin directory match the set of sources that
//! should be exposed there, without ever destroying unrelated files.
//!
//! # Link States
//!
//! Before any link gets created, the target location is classified into one
//! of three [`LinkState`]s:
//!
//! - __absent__: nothing exists at the target, so a link may be created.
//! - __valid__: the target is already a link to the desired source.
//! - __other__: the target is occupied by something else, be it a regular
//!   file, a directory, or a link to a different source.
//!
//! The other state is never overwritten. It is reported back to the caller as
//! a rejection so the caller can move on to the next item.
//!
//! # Link Ownership
//!
//! Links are considered owned by us if their recorded destination lives
//! directly inside a known source directory. Removal only ever touches owned
//! links. Anything else found in a bin directory is left alone.

use std::{
    fs::{read_dir, read_link, remove_file, set_permissions, symlink_metadata},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// State of a link target relative to a desired source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Nothing exists at target.
    Absent,

    /// Target is a link whose recorded destination equals the source.
    Valid,

    /// Target is occupied by something else.
    Other,
}

/// Result of reconciling one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// New link was created.
    Created,

    /// Link already existed, nothing was done.
    Skipped,

    /// Target is occupied by something else, nothing was done.
    Rejected,
}

/// Outcome of reconciling many links at once.
///
/// Items are recorded by name in the order they were reconciled.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
    pub rejected: Vec<String>,
}

impl LinkReport {
    /// Record outcome of reconciling one item.
    pub fn record(&mut self, name: impl Into<String>, outcome: LinkOutcome) {
        let name = name.into();
        match outcome {
            LinkOutcome::Created => self.created.push(name),
            LinkOutcome::Skipped => self.skipped.push(name),
            LinkOutcome::Rejected => self.rejected.push(name),
        }
    }

    /// No item was rejected.
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// How newly created links should be finished.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Mark link executable after creation.
    #[default]
    Executable,

    /// Leave permissions of linked source alone.
    Plain,
}

/// Classify state of link target for a given source.
///
/// Link destinations are compared as recorded, no canonicalization is done.
///
/// # Errors
///
/// - Return [`LinkError::Inspect`] if target cannot be inspected.
/// - Return [`LinkError::ReadLink`] if link destination cannot be read.
pub fn classify(source: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<LinkState> {
    let target = target.as_ref();
    let metadata = match symlink_metadata(target) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(LinkState::Absent),
        Err(err) => {
            return Err(LinkError::Inspect {
                source: err,
                path: target.into(),
            })
        }
    };

    if !metadata.file_type().is_symlink() {
        return Ok(LinkState::Other);
    }

    let destination = read_link(target).map_err(|err| LinkError::ReadLink {
        source: err,
        path: target.into(),
    })?;

    if destination == source.as_ref() {
        Ok(LinkState::Valid)
    } else {
        Ok(LinkState::Other)
    }
}

/// Ensure that target is an executable link to source.
///
/// # Errors
///
/// Same as [`ensure_link_as`].
pub fn ensure_link(source: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<LinkOutcome> {
    ensure_link_as(source, target, LinkMode::Executable)
}

/// Ensure that target is a link to source.
///
/// Creates the link only if nothing occupies the target. Calling this twice
/// with the same arguments yields [`LinkOutcome::Created`] followed by
/// [`LinkOutcome::Skipped`].
///
/// # Errors
///
/// - Return [`LinkError::Inspect`] or [`LinkError::ReadLink`] if target
///   cannot be classified.
/// - Return [`LinkError::CreateLink`] if link cannot be created.
/// - Return [`LinkError::Permissions`] if link cannot be made executable.
#[instrument(skip(source, target), level = "debug")]
pub fn ensure_link_as(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
    mode: LinkMode,
) -> Result<LinkOutcome> {
    let (source, target) = (source.as_ref(), target.as_ref());
    match classify(source, target)? {
        LinkState::Valid => {
            info!("{} already linked", target.display());
            Ok(LinkOutcome::Skipped)
        }
        LinkState::Other => {
            warn!(
                "{} already exists and does not link to {}",
                target.display(),
                source.display()
            );
            Ok(LinkOutcome::Rejected)
        }
        LinkState::Absent => {
            make_symlink(source, target).map_err(|err| LinkError::CreateLink {
                source: err,
                path: target.into(),
            })?;

            if mode == LinkMode::Executable {
                make_executable(target).map_err(|err| LinkError::Permissions {
                    source: err,
                    path: target.into(),
                })?;
            }

            info!("linked {} -> {}", target.display(), source.display());
            Ok(LinkOutcome::Created)
        }
    }
}

/// Remove owned links from bin directories.
///
/// A link is owned if its recorded destination sits directly inside
/// `source_dir`. If `filter` is given, then the file stem of the destination
/// must also match it. Everything else is left untouched.
///
/// Returns paths of removed links in the order they were removed.
///
/// # Errors
///
/// - Return [`LinkError::ReadDir`] if a bin directory cannot be listed.
/// - Return [`LinkError::ReadLink`] if link destination cannot be read.
/// - Return [`LinkError::Remove`] if owned link cannot be removed.
#[instrument(skip(bin_dirs, source_dir), level = "debug")]
pub fn remove_links(
    bin_dirs: impl IntoIterator<Item = impl AsRef<Path>>,
    source_dir: impl AsRef<Path>,
    filter: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let source_dir = source_dir.as_ref();
    let mut removed = Vec::new();

    for bin_dir in bin_dirs {
        let bin_dir = bin_dir.as_ref();
        for link in list_symlinks(bin_dir)? {
            let destination = read_link(&link).map_err(|err| LinkError::ReadLink {
                source: err,
                path: link.clone(),
            })?;

            // INVARIANT: Relative destinations are relative to the link itself.
            let destination = if destination.is_relative() {
                bin_dir.join(destination)
            } else {
                destination
            };

            if destination.parent() != Some(source_dir) {
                debug!("skip unowned link {}", link.display());
                continue;
            }

            if let Some(name) = filter {
                if destination.file_stem().and_then(|stem| stem.to_str()) != Some(name) {
                    continue;
                }
            }

            remove_file(&link).map_err(|err| LinkError::Remove {
                source: err,
                path: link.clone(),
            })?;
            info!("unlinked {}", link.display());
            removed.push(link);
        }
    }

    Ok(removed)
}

fn list_symlinks(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_dir_err = |err| LinkError::ReadDir {
        source: err,
        path: dir.into(),
    };

    let mut links = Vec::new();
    for entry in read_dir(dir).map_err(read_dir_err)? {
        let entry = entry.map_err(read_dir_err)?;
        let file_type = entry.file_type().map_err(read_dir_err)?;
        if file_type.is_symlink() {
            links.push(entry.path());
        }
    }
    links.sort();

    Ok(links)
}

#[cfg(unix)]
fn make_symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn make_symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(source, target)
}

// INVARIANT: Permissions are applied through the link onto its source.
#[cfg(unix)]
fn make_executable(target: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(target)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    set_permissions(target, permissions)
}

#[cfg(windows)]
fn make_executable(_target: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Link reconciliation error types.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Link target cannot be inspected.
    #[error("failed to inspect {:?}", path.display())]
    Inspect {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Recorded destination of link cannot be read.
    #[error("failed to read link {:?}", path.display())]
    ReadLink {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Link cannot be created.
    #[error("failed to create link {:?}", path.display())]
    CreateLink {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Link cannot be marked executable.
    #[error("failed to mark {:?} executable", path.display())]
    Permissions {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Bin directory cannot be listed.
    #[error("failed to read directory {:?}", path.display())]
    ReadDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Owned link cannot be removed.
    #[error("failed to remove link {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = LinkError> = std::result::Result<T, E>;
