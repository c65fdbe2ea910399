//! Configuration for the target
//!
//! Loaded from the file given with `--config` (JSON, or TOML when the file
//! has a `.toml` extension), then overridden by environment variables
//! prefixed with `TARGET_TYPO_`.
//!
//! ## Example config file (config.json):
//! ```json
//! {
//!   "api_key": "typo_key",
//!   "api_secret": "typo_secret",
//!   "cluster_api_endpoint": "https://cluster.typo.ai/management/api/v1",
//!   "repository": "sales",
//!   "send_threshold": 100
//! }
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use config_crate::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::{Result, TargetError};
use crate::retry::RetryPolicy;

/// Largest batch the import endpoint accepts
pub const MAX_SEND_THRESHOLD: usize = 200;

/// Main configuration for the target
#[derive(Clone, Deserialize)]
pub struct TargetConfig {
    /// API key used to request tokens
    #[serde(default)]
    pub api_key: String,

    /// API secret used to request tokens
    #[serde(default)]
    pub api_secret: String,

    /// Base URL of the Typo cluster API
    #[serde(default)]
    pub cluster_api_endpoint: String,

    /// Repository every record is imported into
    #[serde(default)]
    pub repository: String,

    /// Number of records per import request
    #[serde(default = "default_send_threshold")]
    pub send_threshold: usize,

    /// Skip the anonymous usage ping
    #[serde(default)]
    pub disable_collection: bool,

    /// Annotate checkpoints with the key properties of imported records
    #[serde(default)]
    pub track_imported_keys: bool,

    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// Default value functions
fn default_send_threshold() -> usize {
    MAX_SEND_THRESHOLD
}

fn default_retry_max_attempts() -> u32 {
    8
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    60_000
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl TargetConfig {
    /// Build a configuration with the required fields and defaults for the rest
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        cluster_api_endpoint: impl Into<String>,
        repository: impl Into<String>,
        send_threshold: usize,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            cluster_api_endpoint: cluster_api_endpoint.into(),
            repository: repository.into(),
            send_threshold,
            disable_collection: false,
            track_imported_keys: false,
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Load and validate configuration from a file plus the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => FileFormat::Toml,
            _ => FileFormat::Json,
        };
        let name = path
            .to_str()
            .ok_or_else(|| TargetError::InvalidConfig(format!("config path is not valid UTF-8: {:?}", path)))?;

        let config = Config::builder()
            .add_source(File::new(name, format).required(true))
            .add_source(Environment::with_prefix("TARGET_TYPO").try_parsing(true))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and ranges, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        for (name, value) in [
            ("api_key", &self.api_key),
            ("api_secret", &self.api_secret),
            ("cluster_api_endpoint", &self.cluster_api_endpoint),
            ("repository", &self.repository),
        ] {
            if value.trim().is_empty() {
                missing.push(name);
            }
        }

        let mut problems = Vec::new();
        if !missing.is_empty() {
            problems.push(format!("missing required parameters [{}]", missing.join(",")));
        }

        let endpoint = self.cluster_api_endpoint.trim();
        if !endpoint.is_empty() && !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            problems.push(format!("cluster_api_endpoint must be an http(s) URL, got '{}'", endpoint));
        }

        if self.send_threshold == 0 || self.send_threshold > MAX_SEND_THRESHOLD {
            problems.push(format!(
                "send_threshold must be between 1 and {}, got {}",
                MAX_SEND_THRESHOLD, self.send_threshold
            ));
        }

        if self.retry_max_attempts == 0 {
            problems.push("retry_max_attempts must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(TargetError::InvalidConfig(problems.join("; ")))
        }
    }

    /// Retry policy for the token and import calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.retry_max_attempts)
            .with_base_delay(Duration::from_millis(self.retry_base_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry_max_delay_ms))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("cluster_api_endpoint", &self.cluster_api_endpoint)
            .field("repository", &self.repository)
            .field("send_threshold", &self.send_threshold)
            .field("disable_collection", &self.disable_collection)
            .field("track_imported_keys", &self.track_imported_keys)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}
