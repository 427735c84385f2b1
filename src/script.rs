// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Script store management.
//!
//! Bunscript groups small scripts into one place called the __script home__.
//! Scripts are exposed on the user's `PATH` by linking them into a bin
//! directory, and optionally through the bin map of a package manifest.
//!
//! # Script Home Layout
//!
//! ```text
//! $BUNSCRIPT_HOME/
//! ├── package.json      # optional, enables manifest synchronization
//! └── scripts/
//!     ├── foo.ts
//!     └── bar.ts
//! ```
//!
//! Each script is named after its file stem, and that name becomes the name of
//! the link inside the bin directory. The scripts directory doubles as the
//! ownership proof for links: only links pointing directly into it are ever
//! removed.
//!
//! # Manifest Synchronization
//!
//! If the script home contains a `package.json`, then every mutation of the
//! exposed script set is mirrored into its bin map, the manifest is written,
//! and the package manager is told to republish its bin links. If no manifest
//! exists, then symlinks are the only thing that gets touched.

use crate::{
    link::{
        classify, ensure_link, remove_links, LinkError, LinkOutcome, LinkReport, LinkState,
    },
    manifest::{BunLink, ManifestError, PackageManifest, Publish, MANIFEST_FILE, SELF_NAME},
    path::{default_script_home, BinDirs, PathError},
    syscall::{syscall_interactive, SyscallError},
};

use glob::Pattern;
use std::{
    env,
    fs::{remove_file, set_permissions, OpenOptions},
    io::{ErrorKind, Write as _},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Directory inside script home that holds every script.
pub const SCRIPTS_DIR: &str = "scripts";

/// File extension of scripts.
pub const SCRIPT_EXTENSION: &str = "ts";

/// Interpreter line used for new scripts.
pub const DEFAULT_SHEBANG: &str = "#!/usr/bin/env bun";

/// Environment variable overriding interpreter line of new scripts.
pub const SHEBANG_VAR: &str = "BUNSCRIPT_SHEBANG";

/// A script inside the script home.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// Command name of script.
    pub name: String,

    /// Absolute path to script file.
    pub path: PathBuf,
}

/// Collection of scripts in a script home.
#[derive(Debug, Clone)]
pub struct ScriptStore<P = BunLink>
where
    P: Publish,
{
    home: PathBuf,
    scripts_dir: PathBuf,
    shebang: String,
    publisher: P,
}

impl ScriptStore<BunLink> {
    /// Open script store at default script home.
    ///
    /// Interpreter line of new scripts is taken from `$BUNSCRIPT_SHEBANG` if
    /// set.
    ///
    /// # Errors
    ///
    /// - Return [`ScriptError::Path`] if script home cannot be determined.
    pub fn open_default() -> Result<Self> {
        let mut store = Self::new(default_script_home()?, BunLink);
        if let Ok(shebang) = env::var(SHEBANG_VAR) {
            if !shebang.trim().is_empty() {
                store = store.with_shebang(shebang);
            }
        }

        Ok(store)
    }
}

impl<P> ScriptStore<P>
where
    P: Publish,
{
    /// Construct new script store at given script home.
    pub fn new(home: impl Into<PathBuf>, publisher: P) -> Self {
        let home = home.into();
        let scripts_dir = home.join(SCRIPTS_DIR);
        Self {
            home,
            scripts_dir,
            shebang: DEFAULT_SHEBANG.into(),
            publisher,
        }
    }

    /// Use custom interpreter line for new scripts.
    pub fn with_shebang(mut self, shebang: impl Into<String>) -> Self {
        self.shebang = shebang.into();
        self
    }

    /// Path to script home.
    pub fn home(&self) -> &Path {
        self.home.as_path()
    }

    /// Path to directory holding every script.
    pub fn scripts_dir(&self) -> &Path {
        self.scripts_dir.as_path()
    }

    /// Path that script of given name lives at.
    pub fn script_path(&self, name: impl AsRef<str>) -> PathBuf {
        self.scripts_dir
            .join(format!("{}.{SCRIPT_EXTENSION}", name.as_ref()))
    }

    /// List every script in script home sorted by name.
    ///
    /// # Errors
    ///
    /// - Return [`ScriptError::Glob`] if scripts directory cannot be listed.
    pub fn scripts(&self) -> Result<Vec<Script>> {
        let pattern = format!(
            "{}/*.{SCRIPT_EXTENSION}",
            Pattern::escape(self.scripts_dir.to_string_lossy().as_ref())
        );

        let mut scripts = Vec::new();
        for entry in glob::glob(&pattern)? {
            let path = entry?;
            if !path.is_file() {
                continue;
            }

            if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                scripts.push(Script {
                    name: name.to_string(),
                    path: path.clone(),
                });
            }
        }
        scripts.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(scripts)
    }

    /// Find script by name.
    ///
    /// # Errors
    ///
    /// - Return [`ScriptError::NotFound`] if script does not exist.
    pub fn find(&self, name: impl AsRef<str>) -> Result<Script> {
        let name = name.as_ref();
        let path = self.script_path(name);
        if !path.is_file() {
            return Err(ScriptError::NotFound(name.into()));
        }

        Ok(Script {
            name: name.into(),
            path,
        })
    }

    /// Create new script from template.
    ///
    /// Creates the scripts directory if needed. The new script is executable.
    ///
    /// # Errors
    ///
    /// - Return [`ScriptError::InvalidName`] if name cannot be a command name.
    /// - Return [`ScriptError::Reserved`] if name belongs to bunscript itself.
    /// - Return [`ScriptError::AlreadyExists`] if script already exists.
    /// - Return [`ScriptError::Write`] if script cannot be written.
    #[instrument(skip(self), level = "debug")]
    pub fn create(&self, name: &str) -> Result<Script> {
        validate_name(name)?;
        let path = self.script_path(name);

        mkdirp::mkdirp(&self.scripts_dir).map_err(|err| ScriptError::Write {
            source: err,
            path: self.scripts_dir.clone(),
        })?;

        let write_err = |err| ScriptError::Write {
            source: err,
            path: path.clone(),
        };

        // INVARIANT: Never clobber an existing script, even in a race.
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(ScriptError::AlreadyExists(name.into()))
            }
            Err(err) => return Err(write_err(err)),
        };
        file.write_all(self.template().as_bytes())
            .map_err(write_err)?;
        make_script_executable(&path).map_err(write_err)?;
        info!("created {}", path.display());

        Ok(Script {
            name: name.into(),
            path,
        })
    }

    /// Open script in editor.
    ///
    /// Editor command is split on whitespace so that values like `code -w`
    /// work.
    ///
    /// # Errors
    ///
    /// - Return [`ScriptError::NotFound`] if script does not exist.
    /// - Return [`ScriptError::NoEditor`] if editor command is empty.
    /// - Return [`ScriptError::Syscall`] if editor fails.
    pub fn edit(&self, name: &str, editor: &str) -> Result<()> {
        let script = self.find(name)?;
        let mut words = editor.split_whitespace();
        let program = words.next().ok_or(ScriptError::NoEditor)?;
        let args = words
            .map(String::from)
            .chain([script.path.to_string_lossy().into_owned()])
            .collect::<Vec<_>>();

        syscall_interactive(program, args, &self.scripts_dir)?;

        Ok(())
    }

    /// Link one script into primary bin directory.
    ///
    /// Inserts the manifest entry of the script unless linking was rejected.
    /// Unlike [`ScriptStore::link_all`], which mirrors the whole script
    /// directory, nothing else in the manifest changes.
    ///
    /// # Errors
    ///
    /// - Return [`ScriptError::NotFound`] if script does not exist.
    /// - Return [`ScriptError::Link`] if reconciliation fails.
    /// - Return [`ScriptError::Manifest`] if manifest cannot be synchronized.
    #[instrument(skip(self, bins), level = "debug")]
    pub fn link(&self, name: &str, bins: &BinDirs) -> Result<LinkOutcome> {
        let script = self.find(name)?;
        let outcome = ensure_link(&script.path, bins.primary().join(&script.name))?;
        if outcome != LinkOutcome::Rejected {
            let entry = self.manifest_entry(&script.name);
            self.sync_manifest(|manifest| manifest.insert(name, entry))?;
        }

        Ok(outcome)
    }

    /// Link every script into primary bin directory.
    ///
    /// Rejections do not stop the remaining scripts from being linked. The
    /// manifest mirrors every script found afterwards, rejected ones
    /// included.
    ///
    /// # Errors
    ///
    /// - Return [`ScriptError::Link`] if reconciliation fails.
    /// - Return [`ScriptError::Manifest`] if manifest cannot be synchronized.
    #[instrument(skip(self, bins), level = "debug")]
    pub fn link_all(&self, bins: &BinDirs) -> Result<LinkReport> {
        let scripts = self.scripts()?;
        let mut report = LinkReport::default();
        for script in &scripts {
            let outcome = ensure_link(&script.path, bins.primary().join(&script.name))?;
            report.record(script.name.as_str(), outcome);
        }

        let entries = scripts
            .iter()
            .map(|script| (script.name.clone(), self.manifest_entry(&script.name)))
            .collect::<Vec<_>>();
        self.sync_manifest(|manifest| manifest.mirror(entries))?;

        Ok(report)
    }

    /// Unlink one script, or every script, from all bin directories.
    ///
    /// Returns paths of removed links.
    ///
    /// # Errors
    ///
    /// - Return [`ScriptError::Link`] if links cannot be removed.
    /// - Return [`ScriptError::Manifest`] if manifest cannot be synchronized.
    #[instrument(skip(self, bins), level = "debug")]
    pub fn unlink(&self, name: Option<&str>, bins: &BinDirs) -> Result<Vec<PathBuf>> {
        let removed = remove_links(bins.all(), &self.scripts_dir, name)?;
        if removed.is_empty() {
            info!("no links to remove");
        }

        self.sync_manifest(|manifest| match name {
            Some(name) => manifest.remove(name),
            None => manifest.mirror(Vec::<(String, String)>::new()),
        })?;

        Ok(removed)
    }

    /// Unlink and delete script.
    ///
    /// # Errors
    ///
    /// - Return [`ScriptError::NotFound`] if script does not exist, in which
    ///   case nothing is touched.
    /// - Return [`ScriptError::Link`] if links cannot be removed.
    /// - Return [`ScriptError::Remove`] if script cannot be deleted.
    #[instrument(skip(self, bins), level = "debug")]
    pub fn remove(&self, name: &str, bins: &BinDirs) -> Result<()> {
        let script = self.find(name)?;
        self.unlink(Some(name), bins)?;
        remove_file(&script.path).map_err(|err| ScriptError::Remove {
            source: err,
            path: script.path.clone(),
        })?;
        info!("removed {}", script.path.display());

        Ok(())
    }

    /// Link state of every script in primary bin directory.
    ///
    /// # Errors
    ///
    /// - Return [`ScriptError::Link`] if link targets cannot be classified.
    pub fn status(&self, bins: &BinDirs) -> Result<Vec<(Script, LinkState)>> {
        let mut status = Vec::new();
        for script in self.scripts()? {
            let state = classify(&script.path, bins.primary().join(&script.name))?;
            status.push((script, state));
        }

        Ok(status)
    }

    fn template(&self) -> String {
        format!("{}\n\n", self.shebang)
    }

    fn manifest_entry(&self, name: &str) -> String {
        format!("./{SCRIPTS_DIR}/{name}.{SCRIPT_EXTENSION}")
    }

    fn sync_manifest(&self, update: impl FnOnce(&mut PackageManifest)) -> Result<()> {
        let path = self.home.join(MANIFEST_FILE);
        if !path.is_file() {
            debug!("no manifest at {}, skip synchronization", path.display());
            return Ok(());
        }

        let mut manifest = PackageManifest::load(&path)?;
        update(&mut manifest);
        manifest.save(&path)?;
        self.publisher.publish(&self.home)?;

        Ok(())
    }
}

/// Check that name can be used as a script command name.
///
/// # Errors
///
/// - Return [`ScriptError::Reserved`] if name belongs to bunscript itself.
/// - Return [`ScriptError::InvalidName`] if name is empty, hidden, nested, or
///   holds whitespace.
pub fn validate_name(name: &str) -> Result<()> {
    if name == SELF_NAME {
        return Err(ScriptError::Reserved(name.into()));
    }

    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_whitespace);
    if bad {
        return Err(ScriptError::InvalidName(name.into()));
    }

    Ok(())
}

#[cfg(unix)]
fn make_script_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(windows)]
fn make_script_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Script store error types.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Script name cannot be used as a command name.
    #[error("invalid script name {0:?}")]
    InvalidName(String),

    /// Script name belongs to bunscript itself.
    #[error("script name {0:?} is reserved")]
    Reserved(String),

    /// Script already exists.
    #[error("script {0} already exists")]
    AlreadyExists(String),

    /// Script does not exist.
    #[error("couldn't find script {0}")]
    NotFound(String),

    /// No editor program was given.
    #[error("no editor set, export EDITOR to use --edit")]
    NoEditor,

    /// Script cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Script cannot be removed.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Scripts directory pattern is malformed.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Scripts directory cannot be listed.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Syscall(#[from] SyscallError),
}

/// Friendly result alias :3
pub type Result<T, E = ScriptError> = std::result::Result<T, E>;
