//! Shared setup for commands that work on an existing project

use std::path::PathBuf;

use anyhow::Context as _;
use hermes_core::{init_logging, ClickHouseSettings, MigrationConfig};
use hermes_migrate::{ClickHouseConnection, Migrator};

pub struct CommandContext {
    pub migrations_dir: PathBuf,
}

impl CommandContext {
    /// Load the project file and install logging as it describes
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        let config = MigrationConfig::load(config_path)
            .with_context(|| format!("Failed to load configuration from {}", config_path))?;
        init_logging(&config.logging()).context("Failed to initialize logging")?;

        let migrations_dir = config.migrations_dir()?;
        tracing::debug!(dir = %migrations_dir.display(), "migrations directory");

        Ok(Self { migrations_dir })
    }

    pub fn migrator(&self) -> Migrator {
        Migrator::new(&self.migrations_dir)
    }

    /// Connection described by the CLICKHOUSE_* environment, checked with a ping
    pub async fn connect(&self) -> anyhow::Result<ClickHouseConnection> {
        let settings = ClickHouseSettings::from_env()?;
        let url = settings.url()?;
        let conn = ClickHouseConnection::connect(&url).context("Invalid ClickHouse connection URL")?;
        tracing::debug!(endpoint = %conn.endpoint(), database = ?conn.database(), "connecting");

        conn.ping()
            .await
            .with_context(|| format!("ClickHouse server at {} is not reachable", conn.endpoint()))?;
        Ok(conn)
    }
}
