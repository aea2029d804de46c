use std::path::Path;

use hermes_core::{init_logging, LoggingConfig, MigrationConfig};

pub fn run(config_path: &Path, folder_name: Option<&str>) -> anyhow::Result<()> {
    init_logging(&LoggingConfig::stream_only())?;
    let config = create(config_path, folder_name)?;

    tracing::info!(
        folder = %config.migrations_location.display(),
        config_path = %config_path.display(),
        "Initialized hermes project"
    );
    Ok(())
}

/// Write the default project file. Fails if one is already there.
pub fn create(config_path: &Path, folder_name: Option<&str>) -> anyhow::Result<MigrationConfig> {
    Ok(MigrationConfig::init(config_path, folder_name)?)
}
