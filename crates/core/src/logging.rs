//! # Logging
//!
//! Routes `tracing` events to the terminal, a JSON log file, or both, as
//! configured in `hermes.toml`. Installed once per command invocation.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogLevel;
use crate::error::{HermesError, HermesResult};

/// Logging configuration for a single invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Minimum level; `RUST_LOG` overrides it when set
    pub level: LogLevel,
    /// Write JSON lines to `file_path`
    pub log_to_file: bool,
    /// Write human readable lines to stderr
    pub log_to_stream: bool,
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            log_to_file: false,
            log_to_stream: true,
            file_path: None,
        }
    }
}

impl LoggingConfig {
    /// Terminal-only logging, used before a project file is available
    pub fn stream_only() -> Self {
        Self::default()
    }

    /// Whether the stream layer ends up installed.
    ///
    /// With no usable sink configured we still log to the terminal.
    pub fn writes_to_stream(&self) -> bool {
        self.log_to_stream || !self.writes_to_file()
    }

    /// Whether the JSON file layer ends up installed
    pub fn writes_to_file(&self) -> bool {
        self.log_to_file && self.file_path.is_some()
    }
}

/// Initialize the global subscriber
pub fn init_logging(config: &LoggingConfig) -> HermesResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.as_filter()))
        .map_err(HermesError::logging)?;

    let file_layer = match (&config.file_path, config.writes_to_file()) {
        (Some(path), true) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().json().with_writer(Mutex::new(file)))
        }
        _ => None,
    };

    let stream_layer = config
        .writes_to_stream()
        .then(|| fmt::layer().with_writer(io::stderr).with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(stream_layer)
        .with(file_layer)
        .try_init()
        .map_err(HermesError::logging)?;

    tracing::debug!(
        level = %config.level,
        file = config.writes_to_file(),
        stream = config.writes_to_stream(),
        "logging initialized"
    );

    Ok(())
}
