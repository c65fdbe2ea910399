//! Error types for the target

use thiserror::Error;

/// Result type for target operations
pub type Result<T> = std::result::Result<T, TargetError>;

/// Everything that can stop a run.
///
/// Only [`TargetError::Network`] is recovered locally (by the retry policy);
/// every other variant is fatal for the run and is mapped to a non-zero exit
/// status by the driver.
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Unable to parse line as JSON: {source}: {line}")]
    Parse {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid schema for stream '{stream}': {message}")]
    Schema { stream: String, message: String },

    #[error("Record for stream '{stream}' failed validation: {message}")]
    Validation { stream: String, message: String },

    #[error("Record for stream '{stream}' is missing key property '{key}'")]
    MissingKeyProperty { stream: String, key: String },

    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("Giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<TargetError>,
    },

    #[error("{url} returned status code {status}: {body}")]
    RemoteRejection { url: String, status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TargetError {
    /// Whether the failure is a connectivity problem worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, TargetError::Network { .. })
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        TargetError::Protocol(message.into())
    }
}
