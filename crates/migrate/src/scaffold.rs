//! New migration units
//!
//! Appends an empty unit after the current chain tail and links the tail to it.

use std::fs;
use std::path::Path;

use chrono::Local;
use uuid::Uuid;

use crate::chain::Chain;
use crate::error::{MigrateResult, MigrationError};
use crate::unit::{Direction, MigrationInfo, MigrationUnit, SEPARATOR};

/// Fresh unit version: a random UUID in simple hex form
pub fn generate_version() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Directory name for a unit, `<version>--<message with spaces as _>`
pub fn unit_dir_name(version: &str, message: &str) -> String {
    format!("{}{}{}", version, SEPARATOR, message.replace(' ', "_"))
}

/// Create a unit after the tail of `chain` and return it.
///
/// The new unit is written completely before the tail's `next_version` is
/// rewritten, so an interruption leaves an unreachable unit rather than a
/// dangling link.
pub fn create_migration(chain: &Chain, message: &str) -> MigrateResult<MigrationUnit> {
    create_migration_with_version(chain, message, generate_version())
}

pub fn create_migration_with_version(
    chain: &Chain,
    message: &str,
    version: String,
) -> MigrateResult<MigrationUnit> {
    if let Some(missing) = chain.broken_link() {
        tracing::warn!(
            missing = %missing,
            "Chain is broken; the new migration is appended after the last reachable one"
        );
    }

    let tail = chain.tail();
    let dir = chain
        .migrations_dir()
        .join(unit_dir_name(&version, message));
    fs::create_dir(&dir).map_err(|e| MigrationError::io(&dir, e))?;

    let info = MigrationInfo {
        message: message.to_string(),
        version,
        previous_version: tail.map(|t| t.version().to_string()),
        next_version: None,
        creation_date: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
    };
    info.write_to(&dir)?;
    touch(&dir, Direction::Upgrade)?;
    touch(&dir, Direction::Downgrade)?;

    if let Some(tail) = tail {
        let mut tail_info = tail.info().clone();
        tail_info.next_version = Some(info.version.clone());
        tail_info.write_to(&tail.unit.dir)?;
        tracing::debug!(version = %tail.version(), next_version = %info.version, "linked previous tail");
    }

    tracing::info!(
        version = %info.version,
        at = %dir.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
        "new-migration"
    );
    Ok(MigrationUnit { info, dir })
}

fn touch(dir: &Path, direction: Direction) -> MigrateResult<()> {
    let path = dir.join(direction.file_name());
    fs::write(&path, "").map_err(|e| MigrationError::io(&path, e))
}
