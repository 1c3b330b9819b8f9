use std::path::PathBuf;

use thiserror::Error;

/// Errors loading run configuration or entry files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("Unsupported file format: '{}'", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ConfigError> for gauge_core::error::GaugeError {
    fn from(e: ConfigError) -> Self {
        gauge_core::error::GaugeError::Other(e.to_string())
    }
}
