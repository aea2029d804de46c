//! # hermes-core
//!
//! Shared plumbing for the hermes ClickHouse migration tool: the project
//! configuration file, connection settings, logging setup and error types.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ClickHouseSettings, ConfigError, LogLevel, MigrationConfig, DEFAULT_CONFIG_FILE};
pub use error::{HermesError, HermesResult};
pub use logging::{init_logging, LoggingConfig};
