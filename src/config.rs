// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the `.wt` configuration file that sits at the root
//! of every repository cloned by wt, to simplify the process of serialization
//! and deserialization. File I/O is left to the caller to figure out.
//!
//! # General Layout
//!
//! ```json
//! {
//!   "baseBranch": "main",
//!   "sharedFiles": {
//!     ".env": { "link": true, "source": "wt:main" },
//!     "config/local.toml": { "link": false, "source": "file:/home/me/local.toml" }
//!   }
//! }
//! ```
//!
//! The base branch is what new worktrees branch off from. Shared files map a
//! path relative to a worktree onto a [`FileSource`]. Each shared file gets
//! replayed into every worktree created afterwards, either as a copy or as a
//! link.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// File name of configuration at repository root.
pub const CONFIG_FILE: &str = ".wt";

/// Repository configuration layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WtConfig {
    /// Branch that new worktrees branch off from.
    pub base_branch: String,

    /// Files shared into every new worktree keyed by relative destination.
    #[serde(default)]
    pub shared_files: BTreeMap<String, SharedFile>,
}

impl WtConfig {
    /// Construct new configuration for a base branch.
    pub fn new(base_branch: impl Into<String>) -> Self {
        Self {
            base_branch: base_branch.into(),
            shared_files: BTreeMap::new(),
        }
    }
}

impl FromStr for WtConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(data).map_err(ConfigError::Deserialize)
    }
}

impl Display for WtConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            serde_json::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )?;
        fmt.write_str("\n")
    }
}

/// Single shared file entry.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SharedFile {
    /// Link to source instead of copying it.
    #[serde(default)]
    pub link: bool,

    /// Where the file comes from.
    pub source: FileSource,
}

/// Origin of a shared file.
///
/// Serialized as `wt:<worktree>` or `file:<path>`.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum FileSource {
    /// Same relative path inside another worktree.
    Worktree(String),

    /// Arbitrary file on disk.
    File(PathBuf),
}

impl FileSource {
    const WORKTREE_PREFIX: &'static str = "wt:";
    const FILE_PREFIX: &'static str = "file:";

    /// Resolve source to a concrete path.
    ///
    /// Worktree sources resolve against repository root and the destination
    /// of the shared file. File sources are shell expanded.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if file path cannot be
    ///   expanded.
    pub fn resolve(&self, root: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<PathBuf> {
        match self {
            Self::Worktree(name) => Ok(root.as_ref().join(name).join(dest.as_ref())),
            Self::File(path) => Ok(PathBuf::from(
                shellexpand::full(path.to_string_lossy().as_ref())?.into_owned(),
            )),
        }
    }
}

impl FromStr for FileSource {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        if let Some(name) = data.strip_prefix(Self::WORKTREE_PREFIX) {
            if name.is_empty() {
                return Err(ConfigError::InvalidSource(data.into()));
            }

            return Ok(Self::Worktree(name.into()));
        }

        if let Some(path) = data.strip_prefix(Self::FILE_PREFIX) {
            if path.is_empty() {
                return Err(ConfigError::InvalidSource(data.into()));
            }

            return Ok(Self::File(path.into()));
        }

        Err(ConfigError::InvalidSource(data.into()))
    }
}

impl TryFrom<String> for FileSource {
    type Error = ConfigError;

    fn try_from(data: String) -> Result<Self, Self::Error> {
        data.parse()
    }
}

impl From<FileSource> for String {
    fn from(source: FileSource) -> Self {
        source.to_string()
    }
}

impl Display for FileSource {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Worktree(name) => write!(fmt, "{}{name}", Self::WORKTREE_PREFIX),
            Self::File(path) => write!(fmt, "{}{}", Self::FILE_PREFIX, path.display()),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("failed to parse wt configuration")]
    Deserialize(#[source] serde_json::Error),

    /// Failed to serialize configuration.
    #[error("failed to serialize wt configuration")]
    Serialize(#[source] serde_json::Error),

    /// Shared file source is malformed.
    #[error("invalid shared file source {0:?}, expected \"wt:<worktree>\" or \"file:<path>\"")]
    InvalidSource(String),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
