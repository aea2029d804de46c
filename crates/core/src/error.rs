use thiserror::Error;

use crate::config::ConfigError;

/// Result alias used across hermes-core
pub type HermesResult<T> = Result<T, HermesError>;

#[derive(Debug, Error)]
pub enum HermesError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HermesError {
    /// Create a logging setup error
    pub fn logging<T: ToString>(msg: T) -> Self {
        Self::Logging(msg.to_string())
    }
}
