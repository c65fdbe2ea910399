//! Typo API client
//!
//! Talks to two endpoints under the configured cluster URL:
//!
//! - `POST {base}/token` exchanges the API key and secret for a bearer token
//! - `POST {base}/import` uploads a batch of records
//!
//! Connectivity failures are retried according to the [`RetryPolicy`]. An
//! import rejected with 401 re-authenticates once and is sent again with the
//! fresh token.

use serde_json::{json, Value};

use crate::batch::BatchEntry;
use crate::config::TargetConfig;
use crate::error::{Result, TargetError};
use crate::retry::{retry, RetryPolicy};
use crate::transport::{HttpResponse, Transport};

/// Status codes the import endpoint uses to accept a batch
pub const ACCEPTED_STATUSES: [u16; 3] = [200, 201, 202];

/// Authenticated client for the token and import endpoints
pub struct DeliveryClient {
    base_url: String,
    api_key: String,
    api_secret: String,
    token: Option<String>,
    retry: RetryPolicy,
    transport: Box<dyn Transport>,
}

impl DeliveryClient {
    /// Create a client from the target configuration
    pub fn new(config: &TargetConfig, transport: Box<dyn Transport>) -> Self {
        Self::with_credentials(
            &config.cluster_api_endpoint,
            &config.api_key,
            &config.api_secret,
            config.retry_policy(),
            transport,
        )
    }

    pub fn with_credentials(
        base_url: &str,
        api_key: &str,
        api_secret: &str,
        retry: RetryPolicy,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            token: None,
            retry,
            transport,
        }
    }

    /// Base URL with any trailing slash removed
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The current bearer token, if authenticated
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Request a fresh token and store it, replacing any previous one.
    pub async fn authenticate(&mut self) -> Result<&str> {
        let token = self.request_token().await?;
        Ok(self.token.insert(token).as_str())
    }

    /// Exchange the API key and secret for a bearer token.
    pub async fn request_token(&self) -> Result<String> {
        let url = self.url("token");
        let payload = json!({
            "apikey": self.api_key,
            "secret": self.api_secret,
        });

        let response = self.post(&url, None, &payload).await?;
        if response.status != 200 {
            tracing::error!(
                url = %url,
                status = response.status,
                "Token request failed. Please check your credentials."
            );
            return Err(TargetError::RemoteRejection {
                url,
                status: response.status,
                body: response.body,
            });
        }

        let body = response
            .json()
            .map_err(|e| TargetError::Http(format!("{} returned an unreadable token response: {}", url, e)))?;
        let token = body
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| TargetError::Http(format!("{} response has no \"token\" field: {}", url, response.body)))?;

        tracing::debug!("token obtained");
        Ok(token.to_string())
    }

    /// Upload one batch.
    ///
    /// Succeeds only when the import endpoint answers with one of
    /// [`ACCEPTED_STATUSES`]. A 401 triggers exactly one re-authentication
    /// and resend; a second 401 is a rejection like any other status.
    pub async fn import(&mut self, entries: &[BatchEntry]) -> Result<()> {
        let url = self.url("import");
        let payload = serde_json::to_value(entries)?;
        tracing::debug!(payload = %payload, "import payload");

        let token = match self.token.clone() {
            Some(token) => token,
            None => self.authenticate().await?.to_string(),
        };

        let mut response = self.post(&url, Some(&token), &payload).await?;
        if response.status == 401 {
            tracing::info!("Token expired. Requesting new token.");
            let token = self.authenticate().await?.to_string();
            response = self.post(&url, Some(&token), &payload).await?;
        }

        if ACCEPTED_STATUSES.contains(&response.status) {
            return Ok(());
        }

        Err(TargetError::RemoteRejection {
            url,
            status: response.status,
            body: response.message(),
        })
    }

    async fn post(&self, url: &str, bearer: Option<&str>, body: &Value) -> Result<HttpResponse> {
        let transport = self.transport.as_ref();
        retry(&self.retry, TargetError::is_transient, move |attempt| {
            if attempt > 0 {
                tracing::debug!(url, attempt, "retrying request");
            }
            transport.post_json(url, bearer, body)
        })
        .await
    }
}

impl std::fmt::Debug for DeliveryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .field("authenticated", &self.token.is_some())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
