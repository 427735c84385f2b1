// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package manifest layout.
//!
//! The script home of bunscript may carry a `package.json` whose `bin` object
//! is the source of truth for which commands the package manager exposes.
//! Every other field of the manifest is kept exactly as found.
//!
//! # Self Entry
//!
//! The `bin` object always maps `bunscript` to the package entry file. No
//! amount of unlinking will remove it.
//!
//! # Publishing
//!
//! Writing the manifest alone does not expose anything. The package manager
//! has to be told to republish its bin links afterwards, which is modelled
//! through the [`Publish`] trait. The write and the publish are separate
//! steps, so a failed publish leaves the written manifest in place.

use crate::syscall::{syscall_non_interactive, SyscallError};

use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{info, instrument};

/// File name of package manifest inside script home.
pub const MANIFEST_FILE: &str = "package.json";

/// Command name of bunscript itself.
pub const SELF_NAME: &str = "bunscript";

/// Entry file that the self entry always points at.
pub const SELF_ENTRY: &str = "./index.ts";

/// Package manifest layout.
///
/// Only the `bin` object is modelled. The rest of the manifest is carried as
/// found and written back in its original order, with `bin` kept at its
/// original position.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct PackageManifest {
    /// Exposed command names mapped to package relative source paths.
    pub bin: BTreeMap<String, String>,

    document: Map<String, Value>,
}

impl PackageManifest {
    const BIN_FIELD: &'static str = "bin";

    /// Load manifest from file.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::Read`] if file cannot be read.
    /// - Return [`ManifestError::Deserialize`] if file is not a manifest.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        read_to_string(path)
            .map_err(|err| ManifestError::Read {
                source: err,
                path: path.into(),
            })?
            .parse()
    }

    /// Write manifest to file.
    ///
    /// Self entry is pinned before anything gets written.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::Serialize`] if manifest cannot be serialized.
    /// - Return [`ManifestError::Write`] if file cannot be written.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.pin_self();
        let document = self.to_document()?;
        let mut data = serde_json::to_string_pretty(&document).map_err(ManifestError::Serialize)?;
        data.push('\n');
        self.document = document;

        write(path, data).map_err(|err| ManifestError::Write {
            source: err,
            path: path.into(),
        })
    }

    /// Point self entry at package entry file.
    pub fn pin_self(&mut self) {
        self.bin.insert(SELF_NAME.into(), SELF_ENTRY.into());
    }

    /// Expose command through manifest.
    pub fn insert(&mut self, name: impl Into<String>, entry: impl Into<String>) {
        let name = name.into();
        if name != SELF_NAME {
            self.bin.insert(name, entry.into());
        }
    }

    /// Stop exposing command through manifest.
    ///
    /// Does nothing for the self entry.
    pub fn remove(&mut self, name: impl AsRef<str>) {
        if name.as_ref() != SELF_NAME {
            self.bin.remove(name.as_ref());
        }
    }

    /// Replace exposed commands with given listing plus the self entry.
    pub fn mirror(&mut self, entries: impl IntoIterator<Item = (String, String)>) {
        self.bin.clear();
        for (name, entry) in entries {
            self.insert(name, entry);
        }
        self.pin_self();
    }

    /// Names of every exposed command.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.bin.keys().map(String::as_str)
    }

    /// Top level field names in file order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.document.keys().map(String::as_str)
    }

    // INVARIANT: Existing "bin" key keeps its position, a new one goes last.
    fn to_document(&self) -> Result<Map<String, Value>> {
        let mut document = self.document.clone();
        let bin = serde_json::to_value(&self.bin).map_err(ManifestError::Serialize)?;
        document.insert(Self::BIN_FIELD.into(), bin);

        Ok(document)
    }
}

impl FromStr for PackageManifest {
    type Err = ManifestError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let document: Map<String, Value> =
            serde_json::from_str(data).map_err(ManifestError::Deserialize)?;
        let bin = match document.get(Self::BIN_FIELD) {
            Some(bin) => serde_json::from_value(bin.clone()).map_err(ManifestError::Deserialize)?,
            None => BTreeMap::new(),
        };

        Ok(Self { bin, document })
    }
}

impl Display for PackageManifest {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            serde_json::to_string_pretty(&self.to_document()?)
                .map_err(ManifestError::Serialize)?
                .as_str(),
        )
    }
}

/// Republish bin links of a package.
pub trait Publish {
    /// Tell package manager to expose bin map of package at given directory.
    fn publish(&self, package_dir: &Path) -> Result<()>;
}

/// Publish through `bun link`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BunLink;

impl Publish for BunLink {
    #[instrument(skip(self), level = "debug")]
    fn publish(&self, package_dir: &Path) -> Result<()> {
        let output = syscall_non_interactive("bun", ["link"], package_dir)?;
        if !output.is_empty() {
            info!("{output}");
        }

        Ok(())
    }
}

/// Package manifest error types.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Manifest cannot be deserialized.
    #[error("failed to parse package manifest")]
    Deserialize(#[source] serde_json::Error),

    /// Manifest cannot be serialized.
    #[error("failed to serialize package manifest")]
    Serialize(#[source] serde_json::Error),

    /// Manifest file cannot be read.
    #[error("failed to read package manifest at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Manifest file cannot be written.
    #[error("failed to write package manifest at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Package manager failed to republish bin links.
    #[error("failed to publish bin links")]
    Publish(#[from] SyscallError),
}

impl From<ManifestError> for FmtError {
    fn from(_: ManifestError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
pub type Result<T, E = ManifestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const PACKAGE: &str = indoc! {r#"
        {
          "name": "scripts",
          "module": "index.ts",
          "type": "module",
          "bin": {
            "bunscript": "./index.ts",
            "foo": "./scripts/foo.ts"
          },
          "devDependencies": {
            "@types/bun": "latest"
          }
        }
    "#};

    #[test]
    fn parse_keeps_unrelated_fields() -> anyhow::Result<()> {
        let manifest: PackageManifest = PACKAGE.parse()?;
        assert_eq!(
            manifest.commands().collect::<Vec<_>>(),
            vec!["bunscript", "foo"]
        );
        assert_eq!(
            manifest.fields().collect::<Vec<_>>(),
            vec!["name", "module", "type", "bin", "devDependencies"]
        );

        Ok(())
    }

    #[test]
    fn parse_manifest_without_bin() -> anyhow::Result<()> {
        let manifest: PackageManifest = r#"{ "name": "scripts" }"#.parse()?;
        assert!(manifest.bin.is_empty());

        Ok(())
    }

    #[test]
    fn self_entry_survives_removal_and_mirroring() -> anyhow::Result<()> {
        let mut manifest: PackageManifest = PACKAGE.parse()?;

        manifest.remove(SELF_NAME);
        manifest.remove("foo");
        assert_eq!(manifest.commands().collect::<Vec<_>>(), vec!["bunscript"]);

        manifest.mirror(Vec::<(String, String)>::new());
        assert_eq!(manifest.bin.get(SELF_NAME).map(String::as_str), Some(SELF_ENTRY));

        manifest.insert(SELF_NAME, "./scripts/bunscript.ts");
        manifest.mirror([("bar".to_string(), "./scripts/bar.ts".to_string())]);
        assert_eq!(
            manifest.bin,
            BTreeMap::from([
                ("bar".to_string(), "./scripts/bar.ts".to_string()),
                (SELF_NAME.to_string(), SELF_ENTRY.to_string()),
            ])
        );

        Ok(())
    }

    #[test]
    fn save_pins_self_entry() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(MANIFEST_FILE);
        let mut manifest: PackageManifest = r#"{ "name": "scripts", "bin": {} }"#.parse()?;

        manifest.save(&path)?;
        let expect = indoc! {r#"
            {
              "name": "scripts",
              "bin": {
                "bunscript": "./index.ts"
              }
            }
        "#};
        assert_eq!(std::fs::read_to_string(&path)?, expect);
        assert_eq!(PackageManifest::load(&path)?, manifest);

        Ok(())
    }

    #[test]
    fn save_keeps_field_order() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(MANIFEST_FILE);
        let mut manifest: PackageManifest = PACKAGE.parse()?;

        manifest.insert("bar", "./scripts/bar.ts");
        manifest.save(&path)?;
        let expect = indoc! {r#"
            {
              "name": "scripts",
              "module": "index.ts",
              "type": "module",
              "bin": {
                "bar": "./scripts/bar.ts",
                "bunscript": "./index.ts",
                "foo": "./scripts/foo.ts"
              },
              "devDependencies": {
                "@types/bun": "latest"
              }
            }
        "#};
        assert_eq!(std::fs::read_to_string(&path)?, expect);

        Ok(())
    }

    #[test]
    fn save_appends_missing_bin() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(MANIFEST_FILE);
        let mut manifest: PackageManifest = r#"{ "name": "scripts", "private": true }"#.parse()?;

        manifest.save(&path)?;
        let reloaded = PackageManifest::load(&path)?;
        assert_eq!(
            reloaded.fields().collect::<Vec<_>>(),
            vec!["name", "private", "bin"]
        );

        Ok(())
    }
}
