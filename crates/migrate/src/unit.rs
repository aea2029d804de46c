//! Migration units on disk
//!
//! A unit is a directory named `<version>--<free text>` holding an
//! `info.toml` metadata file plus `upgrade.sql` and `downgrade.sql`.
//! This module only reads and validates units; ordering lives in `chain`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MigrateResult, MigrationError};

/// Splits the version prefix from the free-text suffix of a unit directory name
pub const SEPARATOR: &str = "--";

/// Metadata file inside every unit directory
pub const INFO_FILE: &str = "info.toml";

/// Which script of a unit to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Upgrade,
    Downgrade,
}

impl Direction {
    /// Script file name for this direction
    pub fn file_name(&self) -> &'static str {
        match self {
            Direction::Upgrade => "upgrade.sql",
            Direction::Downgrade => "downgrade.sql",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upgrade => "upgrade",
            Direction::Downgrade => "downgrade",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contents of `info.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationInfo {
    pub message: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_version: Option<String>,
    /// ISO-8601 timestamp
    pub creation_date: String,
}

impl MigrationInfo {
    /// Parse metadata text. Empty version references count as unset.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let mut info: MigrationInfo = toml::from_str(content)?;
        info.previous_version = info.previous_version.filter(|v| !v.is_empty());
        info.next_version = info.next_version.filter(|v| !v.is_empty());
        Ok(info)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Write this metadata as `info.toml` inside `dir`
    pub fn write_to(&self, dir: &Path) -> MigrateResult<()> {
        let path = dir.join(INFO_FILE);
        let content = self.to_toml()?;
        fs::write(&path, content).map_err(|e| MigrationError::io(path, e))
    }
}

/// Why a directory is not treated as a migration unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    NotADirectory,
    MissingSeparator,
    MissingMetadata,
    MissingScripts,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            InvalidReason::NotADirectory => "Migration directory is not a directory",
            InvalidReason::MissingSeparator => "Migration directory name does not contain '--'",
            InvalidReason::MissingMetadata => "Migration directory is missing info.toml",
            InvalidReason::MissingScripts => {
                "Migration directory is missing upgrade or downgrade file"
            }
        };
        f.write_str(reason)
    }
}

/// Check the structural requirements of a unit directory
pub fn check_directory(path: &Path) -> Result<(), InvalidReason> {
    if !path.is_dir() {
        return Err(InvalidReason::NotADirectory);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    if !name.contains(SEPARATOR) {
        return Err(InvalidReason::MissingSeparator);
    }

    if !path.join(INFO_FILE).is_file() {
        return Err(InvalidReason::MissingMetadata);
    }

    if !path.join(Direction::Upgrade.file_name()).is_file()
        || !path.join(Direction::Downgrade.file_name()).is_file()
    {
        return Err(InvalidReason::MissingScripts);
    }

    Ok(())
}

/// Same as [`check_directory`], reporting exclusions as warnings
pub fn is_valid_migration_directory(path: &Path) -> bool {
    match check_directory(path) {
        Ok(()) => true,
        Err(reason) => {
            tracing::warn!(dir = %path.display(), "{}", reason);
            false
        }
    }
}

/// A directory belongs to `version` when its name, cut at the first separator,
/// equals `version` exactly.
pub fn matches_version(dir_name: &str, version: &str) -> bool {
    dir_name.split(SEPARATOR).next() == Some(version)
}

/// Entries of `dir` in file-name order
pub fn sorted_entries(dir: &Path) -> MigrateResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| MigrationError::io(dir, e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MigrationError::io(dir, e))?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

/// Locate the directory backing `version`
pub fn find_unit_dir(migrations_dir: &Path, version: &str) -> MigrateResult<Option<PathBuf>> {
    Ok(sorted_entries(migrations_dir)?.into_iter().find(|path| {
        path.is_dir()
            && path
                .file_name()
                .map(|name| matches_version(&name.to_string_lossy(), version))
                .unwrap_or(false)
    }))
}

/// One migration as found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    pub info: MigrationInfo,
    pub dir: PathBuf,
}

impl MigrationUnit {
    /// Parse the metadata of an already validated directory.
    ///
    /// Malformed metadata is an error: the directory passed validation, so a
    /// broken `info.toml` means the unit itself is corrupt.
    pub fn load(dir: &Path) -> MigrateResult<Self> {
        let path = dir.join(INFO_FILE);
        let content = fs::read_to_string(&path).map_err(|e| MigrationError::io(&path, e))?;
        let info = MigrationInfo::from_toml(&content)
            .map_err(|source| MigrationError::MalformedMetadata { path, source })?;

        Ok(Self {
            info,
            dir: dir.to_path_buf(),
        })
    }

    pub fn version(&self) -> &str {
        &self.info.version
    }

    pub fn script_path(&self, direction: Direction) -> PathBuf {
        self.dir.join(direction.file_name())
    }
}

/// Load every valid unit under `migrations_dir`, in file-name order
pub fn scan_units(migrations_dir: &Path) -> MigrateResult<Vec<MigrationUnit>> {
    let mut units = Vec::new();
    for path in sorted_entries(migrations_dir)? {
        if is_valid_migration_directory(&path) {
            units.push(MigrationUnit::load(&path)?);
        }
    }
    Ok(units)
}
