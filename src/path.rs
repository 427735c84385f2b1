// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external directories that need to
//! be interacted with, e.g., the user's home directory, the script home of
//! bunscript, and the __bin directories__ that links get placed into.
//!
//! # Bin Directory Discovery
//!
//! A bin directory is any directory that the user is expected to have on
//! their `PATH`. We never create one ourselves. Candidates are checked in
//! strict preference order:
//!
//! 1. `$BUNSCRIPT_BIN_DIR`
//! 2. `$HOME/bin`
//! 3. `$HOME/.local/bin`
//!
//! Only candidates that already exist as directories qualify. The first
//! qualifying candidate receives every new link, while unlinking scans all of
//! them, since older links may live in a candidate that has since lost
//! priority.

use std::{
    env::{self, VarError},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Environment variable overriding the preferred bin directory.
pub const BIN_DIR_VAR: &str = "BUNSCRIPT_BIN_DIR";

/// Environment variable overriding the script home of bunscript.
pub const SCRIPT_HOME_VAR: &str = "BUNSCRIPT_HOME";

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if home directory path cannot be
///   determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(PathError::NoWayHome)
}

/// Determine absolute path to the script home of bunscript.
///
/// Uses `$BUNSCRIPT_HOME` when set, or `$XDG_DATA_HOME/bunscript` otherwise.
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if data directory cannot be determined.
/// - Return [`PathError::ShellExpansion`] if override cannot be expanded.
pub fn default_script_home() -> Result<PathBuf> {
    if let Some(path) = env_path(SCRIPT_HOME_VAR)? {
        return Ok(path);
    }

    dirs::data_dir()
        .map(|path| path.join("bunscript"))
        .ok_or(PathError::NoWayHome)
}

/// Read path from environment variable with shell expansion applied.
///
/// Empty or unset variables yield `None`.
///
/// # Errors
///
/// - Return [`PathError::ShellExpansion`] if value cannot be expanded.
pub fn env_path(var: &str) -> Result<Option<PathBuf>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(Some(PathBuf::from(
            shellexpand::full(value.as_str())?.into_owned(),
        ))),
        _ => Ok(None),
    }
}

/// Qualifying bin directories in preference order.
///
/// # Invariant
///
/// - Never empty.
/// - Every entry existed as a directory at discovery time.
/// - No duplicate entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinDirs {
    dirs: Vec<PathBuf>,
}

impl BinDirs {
    /// Discover qualifying bin directories.
    ///
    /// # Errors
    ///
    /// - Return [`PathError::NoBinDir`] if no candidate exists as a
    ///   directory.
    pub fn discover(preferred: Option<PathBuf>, home: impl AsRef<Path>) -> Result<Self> {
        let home = home.as_ref();
        let candidates = preferred
            .into_iter()
            .chain([home.join("bin"), home.join(".local").join("bin")])
            .collect::<Vec<_>>();

        let mut dirs = Vec::new();
        for candidate in &candidates {
            if !candidate.is_dir() {
                debug!("skip bin directory candidate {}", candidate.display());
                continue;
            }

            if !dirs.contains(candidate) {
                dirs.push(candidate.clone());
            }
        }

        if dirs.is_empty() {
            return Err(PathError::NoBinDir {
                searched: candidates,
            });
        }

        Ok(Self { dirs })
    }

    /// Discover qualifying bin directories from the environment.
    ///
    /// # Errors
    ///
    /// - Return [`PathError::NoWayHome`] if home directory is unknown.
    /// - Return [`PathError::ShellExpansion`] if override cannot be expanded.
    /// - Return [`PathError::NoBinDir`] if no candidate qualifies.
    pub fn from_env() -> Result<Self> {
        let home = home_dir()?;
        Self::discover(env_path(BIN_DIR_VAR)?, home)
    }

    /// Bin directory that receives new links.
    pub fn primary(&self) -> &Path {
        // INVARIANT: Discovery never yields an empty listing.
        self.dirs[0].as_path()
    }

    /// Every qualifying bin directory.
    pub fn all(&self) -> &[PathBuf] {
        self.dirs.as_slice()
    }
}

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// No way to determine user's home directory.
    #[error("cannot determine absolute path to user's home directory")]
    NoWayHome,

    /// No bin directory candidate exists.
    #[error("no bin directory found, create one of: {}", display_paths(searched))]
    NoBinDir { searched: Vec<PathBuf> },

    /// Environment value cannot be shell expanded.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<VarError>),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::create_dir_all;
    use tempfile::TempDir;

    #[test]
    fn discover_prefers_override() -> anyhow::Result<()> {
        let home = TempDir::new()?;
        let custom = home.path().join("custom");
        create_dir_all(&custom)?;
        create_dir_all(home.path().join("bin"))?;
        create_dir_all(home.path().join(".local/bin"))?;

        let bins = BinDirs::discover(Some(custom.clone()), home.path())?;
        assert_eq!(bins.primary(), custom.as_path());
        assert_eq!(
            bins.all(),
            &[custom, home.path().join("bin"), home.path().join(".local/bin")]
        );

        Ok(())
    }

    #[test]
    fn discover_skips_missing_candidates() -> anyhow::Result<()> {
        let home = TempDir::new()?;
        create_dir_all(home.path().join(".local/bin"))?;

        let bins = BinDirs::discover(Some(home.path().join("nope")), home.path())?;
        assert_eq!(bins.primary(), home.path().join(".local/bin").as_path());
        assert_eq!(bins.all().len(), 1);

        Ok(())
    }

    #[test]
    fn discover_ignores_regular_files() -> anyhow::Result<()> {
        let home = TempDir::new()?;
        std::fs::write(home.path().join("bin"), "not a directory")?;
        create_dir_all(home.path().join(".local/bin"))?;

        let bins = BinDirs::discover(None, home.path())?;
        assert_eq!(bins.all(), &[home.path().join(".local/bin")]);

        Ok(())
    }

    #[test]
    fn discover_collapses_duplicates() -> anyhow::Result<()> {
        let home = TempDir::new()?;
        create_dir_all(home.path().join("bin"))?;

        let bins = BinDirs::discover(Some(home.path().join("bin")), home.path())?;
        assert_eq!(bins.all(), &[home.path().join("bin")]);

        Ok(())
    }

    #[test]
    fn discover_fails_without_candidates() -> anyhow::Result<()> {
        let home = TempDir::new()?;
        let result = BinDirs::discover(None, home.path());
        assert!(matches!(result, Err(PathError::NoBinDir { ref searched }) if searched.len() == 2));

        Ok(())
    }

    #[sealed_test(env = [("BUNSCRIPT_BIN_DIR", "$BLAH/bin"), ("BLAH", "/home/blah")])]
    fn env_path_expands_variables() -> anyhow::Result<()> {
        assert_eq!(env_path(BIN_DIR_VAR)?, Some(PathBuf::from("/home/blah/bin")));
        Ok(())
    }

    #[sealed_test(env = [("BUNSCRIPT_BIN_DIR", "  ")])]
    fn env_path_treats_blank_as_unset() -> anyhow::Result<()> {
        assert_eq!(env_path(BIN_DIR_VAR)?, None);
        Ok(())
    }

    #[sealed_test(env = [("BUNSCRIPT_HOME", "/opt/scripts")])]
    fn script_home_uses_override() -> anyhow::Result<()> {
        assert_eq!(default_script_home()?, PathBuf::from("/opt/scripts"));
        Ok(())
    }
}
