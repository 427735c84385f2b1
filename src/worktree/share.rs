// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shared file handling.
//!
//! A shared file is an untracked file that every worktree of a workspace
//! needs, e.g., `.env` files or local tool configuration. It is either copied
//! or linked into a worktree from its [`FileSource`].
//!
//! Sharing never clobbers anything. A linked file goes through the same link
//! reconciliation as scripts do, and a copied file is only written if its
//! destination is vacant.

use crate::{
    config::{ConfigError, FileSource, SharedFile},
    link::{ensure_link_as, LinkMode, LinkOutcome},
    worktree::{Result, WorktreeError},
};

use std::{
    fs::{copy, symlink_metadata},
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Parse one source and destination pair given on the command line.
///
/// Sources of the form `wt:<worktree>` name a worktree of the workspace.
/// Anything else is a plain path, shell expanded and taken relative to `cwd`.
///
/// # Errors
///
/// - Return [`WorktreeError::InvalidDestination`] if destination is not a
///   plain relative path.
/// - Return [`WorktreeError::Config`] if worktree source is malformed.
pub fn parse_pair(
    source: &str,
    dest: &str,
    link: bool,
    cwd: impl AsRef<Path>,
) -> Result<(String, SharedFile)> {
    validate_dest(dest)?;

    let source = if source.starts_with("wt:") {
        source.parse()?
    } else {
        let expanded = shellexpand::full(source).map_err(ConfigError::from)?;
        FileSource::File(cwd.as_ref().join(expanded.as_ref()))
    };

    Ok((dest.to_string(), SharedFile { link, source }))
}

/// Apply shared file to worktree.
///
/// Missing sources and occupied destinations are rejected without touching
/// anything. A source that already is the destination is skipped.
///
/// # Errors
///
/// - Return [`WorktreeError::InvalidDestination`] if destination is not a
///   plain relative path.
/// - Return [`WorktreeError::Config`] if source cannot be resolved.
/// - Return [`WorktreeError::Share`] if linking fails.
/// - Return [`WorktreeError::Io`] if copying fails.
#[instrument(skip(root, worktree, shared), level = "debug")]
pub fn apply(
    root: impl AsRef<Path>,
    worktree: impl AsRef<Path>,
    dest: &str,
    shared: &SharedFile,
) -> Result<LinkOutcome> {
    validate_dest(dest)?;
    let source = shared.source.resolve(root, dest)?;
    let target = worktree.as_ref().join(dest);

    if source == target {
        info!("{} is its own source", target.display());
        return Ok(LinkOutcome::Skipped);
    }

    if !source.exists() {
        warn!("cannot share {dest}, {} does not exist", source.display());
        return Ok(LinkOutcome::Rejected);
    }

    if let Some(parent) = target.parent() {
        mkdirp::mkdirp(parent).map_err(|err| WorktreeError::Io {
            source: err,
            path: parent.into(),
        })?;
    }

    if shared.link {
        return Ok(ensure_link_as(&source, &target, LinkMode::Plain)?);
    }

    copy_if_vacant(&source, &target)
}

fn copy_if_vacant(source: &Path, target: &Path) -> Result<LinkOutcome> {
    match symlink_metadata(target) {
        Ok(_) => {
            warn!("{} already exists, not copying", target.display());
            return Ok(LinkOutcome::Rejected);
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(WorktreeError::Io {
                source: err,
                path: target.into(),
            })
        }
    }

    copy(source, target).map_err(|err| WorktreeError::Io {
        source: err,
        path: target.into(),
    })?;
    info!("copied {} -> {}", source.display(), target.display());

    Ok(LinkOutcome::Created)
}

fn validate_dest(dest: &str) -> Result<()> {
    let path = PathBuf::from(dest);
    let plain = !dest.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if !plain {
        return Err(WorktreeError::InvalidDestination(dest.into()));
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::fs::{create_dir_all, read_link, read_to_string, write};
    use tempfile::TempDir;

    #[test_case(".env", true; "dotfile")]
    #[test_case("config/local.toml", true; "nested")]
    #[test_case("/etc/hosts", false; "absolute")]
    #[test_case("../escape", false; "parent")]
    #[test_case("", false; "empty")]
    #[test]
    fn destinations_must_stay_inside(dest: &str, ok: bool) {
        pretty_assertions::assert_eq!(validate_dest(dest).is_ok(), ok);
    }

    #[test]
    fn parse_pair_distinguishes_sources() -> anyhow::Result<()> {
        let (dest, shared) = parse_pair("wt:main", ".env", true, "/work")?;
        assert_eq!(dest, ".env");
        assert_eq!(
            shared,
            SharedFile {
                link: true,
                source: FileSource::Worktree("main".into()),
            }
        );

        let (_, shared) = parse_pair("secrets/.env", ".env", false, "/work")?;
        assert_eq!(shared.source, FileSource::File("/work/secrets/.env".into()));

        let (_, shared) = parse_pair("/abs/.env", ".env", false, "/work")?;
        assert_eq!(shared.source, FileSource::File("/abs/.env".into()));

        assert!(matches!(
            parse_pair("wt:main", "/abs", false, "/work"),
            Err(WorktreeError::InvalidDestination(_))
        ));

        Ok(())
    }

    #[test]
    fn apply_copies_links_and_rejects() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let root = tmp.path();
        create_dir_all(root.join("main/config"))?;
        create_dir_all(root.join("dev"))?;
        write(root.join("main/config/app.toml"), "debug = true\n")?;
        write(root.join("main/.env"), "A=1\n")?;
        write(root.join("dev/.env"), "mine\n")?;

        let copied = SharedFile {
            link: false,
            source: FileSource::Worktree("main".into()),
        };
        let linked = SharedFile {
            link: true,
            source: FileSource::Worktree("main".into()),
        };
        let dev = root.join("dev");

        assert_eq!(apply(root, &dev, "config/app.toml", &copied)?, LinkOutcome::Created);
        assert_eq!(read_to_string(dev.join("config/app.toml"))?, "debug = true\n");
        assert_eq!(apply(root, &dev, "config/app.toml", &copied)?, LinkOutcome::Rejected);

        assert_eq!(apply(root, &dev, ".env", &linked)?, LinkOutcome::Rejected);
        assert_eq!(read_to_string(dev.join(".env"))?, "mine\n");

        std::fs::remove_file(dev.join(".env"))?;
        assert_eq!(apply(root, &dev, ".env", &linked)?, LinkOutcome::Created);
        assert_eq!(read_link(dev.join(".env"))?, root.join("main/.env"));
        assert_eq!(apply(root, &dev, ".env", &linked)?, LinkOutcome::Skipped);

        assert_eq!(apply(root, &dev, "missing", &copied)?, LinkOutcome::Rejected);
        assert_eq!(apply(root, root.join("main"), ".env", &linked)?, LinkOutcome::Skipped);

        Ok(())
    }
}
