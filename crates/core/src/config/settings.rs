//! ClickHouse connection settings read from the environment

use std::env;

use url::Url;

use super::validation::ConfigError;

/// Connection settings for the target ClickHouse server.
///
/// `CLICKHOUSE_URI` takes precedence over the individual parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickHouseSettings {
    pub uri: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ClickHouseSettings {
    /// Read settings from the process environment, loading `.env` first if present
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port = match get_env_optional("CLICKHOUSE_PORT") {
            Some(port) => Some(port.parse::<u16>().map_err(|_| {
                ConfigError::invalid_value("CLICKHOUSE_PORT", port, "valid port number (0-65535)")
            })?),
            None => None,
        };

        Ok(Self {
            uri: get_env_optional("CLICKHOUSE_URI"),
            host: get_env_optional("CLICKHOUSE_HOST"),
            port,
            database: get_env_optional("CLICKHOUSE_DATABASE"),
            user: get_env_optional("CLICKHOUSE_USER"),
            password: get_env_optional("CLICKHOUSE_PASSWORD"),
        })
    }

    /// Render the connection URL
    pub fn url(&self) -> Result<String, ConfigError> {
        if let Some(uri) = &self.uri {
            return Ok(uri.clone());
        }

        if self.host.is_none()
            && self.port.is_none()
            && self.database.is_none()
            && self.user.is_none()
            && self.password.is_none()
        {
            return Err(ConfigError::NoConnectionSettings);
        }

        let mut missing = Vec::new();
        if self.host.is_none() {
            missing.push("CLICKHOUSE_HOST".to_string());
        }
        if self.port.is_none() {
            missing.push("CLICKHOUSE_PORT".to_string());
        }
        if self.database.is_none() {
            missing.push("CLICKHOUSE_DATABASE".to_string());
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnvVars { vars: missing });
        }

        // presence checked above
        let host = self.host.as_deref().unwrap_or_default();
        let port = self.port.unwrap_or_default();
        let database = self.database.as_deref().unwrap_or_default();

        let mut url = Url::parse(&format!("clickhouse://{}:{}/{}", host, port, database))
            .map_err(|e| ConfigError::invalid_value("CLICKHOUSE_HOST", host, e.to_string()))?;

        // Credentials are percent-encoded by the setters
        if let Some(user) = &self.user {
            url.set_username(user).map_err(|_| {
                ConfigError::invalid_value("CLICKHOUSE_USER", user.as_str(), "URL user name")
            })?;
            if let Some(password) = &self.password {
                url.set_password(Some(password)).map_err(|_| {
                    ConfigError::invalid_value("CLICKHOUSE_PASSWORD", "<redacted>", "URL password")
                })?;
            }
        }

        Ok(url.to_string())
    }
}

fn get_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}
