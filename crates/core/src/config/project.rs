//! Project configuration file (`hermes.toml`)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::validation::ConfigError;
use crate::logging::LoggingConfig;

/// Default name of the project configuration file
pub const DEFAULT_CONFIG_FILE: &str = "hermes.toml";

/// Log level as written in the project file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            // tracing has nothing above error
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            _ => Err(ConfigError::invalid_value(
                "log-level",
                s,
                "trace, debug, info, warning, error, or critical",
            )),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        };
        write!(f, "{}", level)
    }
}

/// Settings read from `hermes.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MigrationConfig {
    /// Directory holding one sub-directory per migration
    pub migrations_location: PathBuf,
    pub log_level: LogLevel,
    pub log_to_file: bool,
    pub log_to_stream: bool,
    pub log_file_path: PathBuf,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_location: PathBuf::from("versions"),
            log_level: LogLevel::Info,
            log_to_file: true,
            log_to_stream: true,
            log_file_path: PathBuf::from("hermes.log"),
        }
    }
}

impl MigrationConfig {
    /// Load the project file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write a default project file, optionally pointing at a custom migrations folder.
    ///
    /// An existing file is never overwritten.
    pub fn init(path: impl AsRef<Path>, folder_name: Option<&str>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            return Err(ConfigError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }

        let mut config = Self::default();
        if let Some(folder) = folder_name {
            config.migrations_location = PathBuf::from(folder);
        }
        config.save(path)?;
        Ok(config)
    }

    /// Serialize this configuration to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Migrations directory, created on first use
    pub fn migrations_dir(&self) -> Result<PathBuf, ConfigError> {
        if !self.migrations_location.exists() {
            fs::create_dir_all(&self.migrations_location)?;
        }
        Ok(self.migrations_location.clone())
    }

    /// Logging settings derived from this file
    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level,
            log_to_file: self.log_to_file,
            log_to_stream: self.log_to_stream,
            file_path: self.log_to_file.then(|| self.log_file_path.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = MigrationConfig::default();
        assert_eq!(config.migrations_location, PathBuf::from("versions"));
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.log_to_file);
        assert!(config.log_to_stream);
        assert_eq!(config.log_file_path, PathBuf::from("hermes.log"));
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "migrations-location = \"migrations\"\nlog-level = \"debug\"\n").unwrap();

        let config = MigrationConfig::load(&path).unwrap();
        assert_eq!(config.migrations_location, PathBuf::from("migrations"));
        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(config.log_to_stream);
        assert_eq!(config.log_file_path, PathBuf::from("hermes.log"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = MigrationConfig::load(temp_dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_load_invalid_log_level() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "log-level = \"loud\"\n").unwrap();

        let result = MigrationConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_init_writes_file_and_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);

        let config = MigrationConfig::init(&path, Some("db/versions")).unwrap();
        assert_eq!(config.migrations_location, PathBuf::from("db/versions"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("migrations-location = \"db/versions\""));
        assert!(content.contains("log-level = \"info\""));

        let again = MigrationConfig::init(&path, None);
        assert!(matches!(again, Err(ConfigError::AlreadyExists { .. })));
        assert_eq!(MigrationConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_migrations_dir_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let config = MigrationConfig {
            migrations_location: temp_dir.path().join("versions"),
            ..MigrationConfig::default()
        };

        let dir = config.migrations_dir().unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("critical".parse::<LogLevel>().unwrap().as_filter(), "error");
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_logging_drops_file_path_when_disabled() {
        let config = MigrationConfig {
            log_to_file: false,
            ..MigrationConfig::default()
        };
        assert!(config.logging().file_path.is_none());
    }
}
