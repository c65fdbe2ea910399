//! HTTP transport used by the delivery client.
//!
//! The client only ever POSTs JSON, so the seam is a single method. The
//! production implementation is backed by `reqwest`; tests plug in a scripted
//! transport instead.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, TargetError};

/// Status code and raw body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Decode the body as JSON
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// The `message` field of a JSON body, falling back to the raw body.
    pub fn message(&self) -> String {
        self.json()
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| self.body.clone())
    }
}

/// Sends JSON POST requests.
///
/// Implementations must report connectivity problems (connect failures,
/// timeouts, dropped connections) as [`TargetError::Network`] so they can be
/// retried. Any HTTP status, including errors, is a successful `HttpResponse`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, url: &str, bearer: Option<&str>, body: &Value) -> Result<HttpResponse>;
}

/// `reqwest`-backed transport with fixed connect and request timeouts
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| TargetError::Http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, bearer: Option<&str>, body: &Value) -> Result<HttpResponse> {
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let network = |e: reqwest::Error| {
            if e.is_builder() {
                TargetError::Http(e.to_string())
            } else {
                TargetError::Network {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let response = request.send().await.map_err(network)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(network)?;

        tracing::debug!(url, status, body = %body, "response received");
        Ok(HttpResponse { status, body })
    }
}
