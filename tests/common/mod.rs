// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use git2::{IndexEntry, IndexTime, Repository, RepositoryInitOptions};
use std::{fs::create_dir_all, path::Path, path::PathBuf};
use tempfile::TempDir;

/// Isolated environment for bunscript runs.
#[allow(dead_code)]
pub struct ScriptEnv {
    pub root: TempDir,
    pub home: PathBuf,
    pub script_home: PathBuf,
    pub bin: PathBuf,
}

#[allow(dead_code)]
impl ScriptEnv {
    pub fn new() -> anyhow::Result<Self> {
        let root = TempDir::new()?;
        let home = root.path().join("user");
        let script_home = root.path().join("bunscript");
        let bin = root.path().join("bin");
        create_dir_all(&home)?;
        create_dir_all(&bin)?;

        Ok(Self {
            root,
            home,
            script_home,
            bin,
        })
    }

    pub fn bunscript(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("bunscript");
        cmd.current_dir(self.root.path())
            .env("HOME", &self.home)
            .env("BUNSCRIPT_HOME", &self.script_home)
            .env("BUNSCRIPT_BIN_DIR", &self.bin)
            .env_remove("BUNSCRIPT_SHEBANG")
            .env_remove("EDITOR")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn script(&self, name: &str) -> PathBuf {
        self.script_home.join("scripts").join(format!("{name}.ts"))
    }
}

#[allow(dead_code)]
pub fn wt_cmd(cwd: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("wt");
    cmd.current_dir(cwd).env_remove("RUST_LOG");
    cmd
}

/// Local remote to clone workspaces from.
#[allow(dead_code)]
pub struct RepoFixture {
    pub repo: Repository,
}

#[allow(dead_code)]
impl RepoFixture {
    pub fn new(path: impl AsRef<Path>, head: &str) -> anyhow::Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(head);
        let repo = Repository::init_opts(path.as_ref(), &opts)?;

        // INVARIANT: Always provide valid name and email.
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        Ok(Self { repo })
    }

    pub fn stage_and_commit(&self, filename: &str, contents: &str) -> anyhow::Result<()> {
        let entry = IndexEntry {
            ctime: IndexTime::new(0, 0),
            mtime: IndexTime::new(0, 0),
            dev: 0,
            ino: 0,
            mode: 0o100644,
            uid: 0,
            gid: 0,
            file_size: contents.len() as u32,
            id: self.repo.blob(contents.as_bytes())?,
            flags: 0,
            flags_extended: 0,
            path: filename.as_bytes().to_vec(),
        };

        let mut index = self.repo.index()?;
        index.add_frombuffer(&entry, contents.as_bytes())?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        let signature = self.repo.signature()?;
        let mut parents = Vec::new();
        if let Some(parent) = self.repo.head().ok().and_then(|head| head.target()) {
            parents.push(self.repo.find_commit(parent)?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &format!("chore: add {filename}"),
            &tree,
            &parents,
        )?;

        Ok(())
    }
}
