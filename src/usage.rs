//! Anonymous usage ping.
//!
//! On startup the target reports its name and version to the Singer
//! collector, unless `disable_collection` is set. The ping runs on its own
//! task, shares nothing with the pipeline, and its failures are only logged.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::{Result, TargetError};

/// Singer usage collector endpoint
pub const COLLECTOR_URL: &str = "http://collector.singer.io/i";

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameters of the ping
pub fn usage_params(version: &str) -> [(&'static str, String); 5] {
    [
        ("e", "se".to_string()),
        ("aid", "singer".to_string()),
        ("se_ca", env!("CARGO_PKG_NAME").to_string()),
        ("se_ac", "open".to_string()),
        ("se_la", version.to_string()),
    ]
}

/// Send one ping to `url`.
pub async fn send_usage_stats(url: &str, version: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(PING_TIMEOUT)
        .build()
        .map_err(|e| TargetError::Http(e.to_string()))?;

    client
        .get(url)
        .query(&usage_params(version))
        .send()
        .await
        .map_err(|e| TargetError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    Ok(())
}

/// Fire the ping in the background; errors are swallowed.
pub fn spawn_usage_ping(version: &'static str) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = send_usage_stats(COLLECTOR_URL, version).await {
            tracing::debug!(error = %e, "Collection request failed");
        }
    })
}
