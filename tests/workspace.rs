// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

#![cfg(unix)]

mod common;

use binkit::{
    config::{FileSource, SharedFile, CONFIG_FILE},
    worktree::{
        clone::{clone_workspace, FETCH_REFSPEC},
        Workspace, WorktreeError, BARE_DIR,
    },
};

use common::RepoFixture;
use git2::Repository;
use indicatif::ProgressBar;
use pretty_assertions::assert_eq;
use std::fs::{read_link, read_to_string, remove_file, symlink_metadata, write};
use tempfile::TempDir;

fn cloned_workspace(tmp: &TempDir) -> anyhow::Result<Workspace> {
    let remote = tmp.path().join("remote");
    let fixture = RepoFixture::new(&remote, "main")?;
    fixture.stage_and_commit("README.md", "hello\n")?;

    Ok(clone_workspace(
        remote.to_string_lossy().as_ref(),
        tmp.path().join("repo"),
        ProgressBar::hidden(),
    )?)
}

fn from_main(link: bool) -> SharedFile {
    SharedFile {
        link,
        source: FileSource::Worktree("main".into()),
    }
}

#[test]
fn clone_sets_up_workspace_layout() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let dest = tmp.path().join("repo");
    let workspace = cloned_workspace(&tmp)?;

    assert_eq!(workspace.root(), dest.as_path());
    assert_eq!(read_to_string(dest.join(".git"))?, "gitdir: ./.bare\n");
    assert!(dest.join(BARE_DIR).join("HEAD").is_file());
    assert_eq!(read_to_string(dest.join("main/README.md"))?, "hello\n");
    assert_eq!(
        read_to_string(dest.join(CONFIG_FILE))?,
        "{\n  \"baseBranch\": \"main\",\n  \"sharedFiles\": {}\n}\n"
    );

    let repository = Repository::open_bare(dest.join(BARE_DIR))?;
    assert_eq!(
        repository.config()?.get_string("remote.origin.fetch")?,
        FETCH_REFSPEC
    );

    Ok(())
}

#[test]
fn clone_falls_back_to_master() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let remote = tmp.path().join("remote");
    RepoFixture::new(&remote, "master")?.stage_and_commit("README.md", "old school\n")?;

    let workspace = clone_workspace(
        remote.to_string_lossy().as_ref(),
        tmp.path().join("repo"),
        ProgressBar::hidden(),
    )?;
    assert_eq!(workspace.config().base_branch, "master");
    assert!(workspace.root().join("master/README.md").is_file());

    Ok(())
}

#[test]
fn clone_without_default_branch_fails() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let remote = tmp.path().join("remote");
    RepoFixture::new(&remote, "trunk")?.stage_and_commit("README.md", "no main here\n")?;

    let result = clone_workspace(
        remote.to_string_lossy().as_ref(),
        tmp.path().join("repo"),
        ProgressBar::hidden(),
    );
    assert!(matches!(result, Err(WorktreeError::NoDefaultBranch(_))));

    Ok(())
}

#[test]
fn discover_from_nested_path() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let workspace = cloned_workspace(&tmp)?;
    let nested = workspace.root().join("main");

    let found = Workspace::discover(&nested)?;
    assert_eq!(found.root(), workspace.root());
    assert_eq!(found.config().base_branch, "main");
    assert_eq!(found.current_worktree(&nested)?, nested);

    Ok(())
}

#[test]
fn add_worktree_branches_from_base_and_replays_shared_files() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let mut workspace = cloned_workspace(&tmp)?;
    let main = workspace.root().join("main");
    write(main.join(".env"), "SECRET=1\n")?;
    write(main.join("notes.txt"), "remember\n")?;

    let entries = vec![
        (".env".to_string(), from_main(true)),
        ("notes.txt".to_string(), from_main(false)),
    ];
    let report = workspace.share(entries, &main, false)?;
    assert_eq!(report.skipped, vec![".env", "notes.txt"]);

    let workspace = Workspace::open(workspace.root())?;
    assert_eq!(workspace.config().shared_files.len(), 2);

    let (path, report) = workspace.add_worktree("feature/x", None)?;
    assert!(report.is_clean());
    assert_eq!(path, workspace.root().join("feature/x"));
    assert_eq!(read_to_string(path.join("README.md"))?, "hello\n");
    assert_eq!(read_link(path.join(".env"))?, main.join(".env"));
    assert_eq!(read_to_string(path.join("notes.txt"))?, "remember\n");
    assert!(!symlink_metadata(path.join("notes.txt"))?
        .file_type()
        .is_symlink());

    let result = workspace.add_worktree("feature/x", None);
    assert!(matches!(result, Err(WorktreeError::WorktreeExists(_))));

    Ok(())
}

#[test]
fn add_worktree_reports_unsharable_files() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let mut workspace = cloned_workspace(&tmp)?;
    let main = workspace.root().join("main");
    write(main.join(".env"), "SECRET=1\n")?;
    workspace.share(vec![(".env".to_string(), from_main(true))], &main, false)?;
    remove_file(main.join(".env"))?;

    let (path, report) = workspace.add_worktree("dev", None)?;
    assert_eq!(report.rejected, vec![".env"]);
    assert!(path.join("README.md").is_file());
    assert!(symlink_metadata(path.join(".env")).is_err());

    Ok(())
}

#[test]
fn share_once_does_not_persist() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let mut workspace = cloned_workspace(&tmp)?;
    let main = workspace.root().join("main");
    let outside = tmp.path().join("local.toml");
    write(&outside, "x = 1\n")?;

    let entries = vec![(
        "local.toml".to_string(),
        SharedFile {
            link: false,
            source: FileSource::File(outside.clone()),
        },
    )];
    let report = workspace.share(entries, &main, true)?;
    assert_eq!(report.created, vec!["local.toml"]);
    assert_eq!(read_to_string(main.join("local.toml"))?, "x = 1\n");

    let workspace = Workspace::open(workspace.root())?;
    assert!(workspace.config().shared_files.is_empty());

    Ok(())
}
