//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use target_typo::{DeliveryClient, HttpResponse, MessageRouter, TargetConfig, TargetError, Transport};

/// A request seen by the scripted transport
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub bearer: Option<String>,
    pub body: Value,
}

enum Scripted {
    Response(HttpResponse),
    NetworkFailure,
}

#[derive(Default)]
struct Inner {
    requests: Vec<Request>,
    scripted: HashMap<String, VecDeque<Scripted>>,
    tokens_issued: u32,
}

/// In-process transport that records every request.
///
/// Responses are scripted per endpoint (`"token"` or `"import"`). Once the
/// script for an endpoint runs out, `/token` issues `token-1`, `token-2`, ...
/// and `/import` answers 200.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, endpoint: &str, status: u16, body: &str) -> &Self {
        self.push(endpoint, Scripted::Response(HttpResponse::new(status, body)))
    }

    pub fn fail(&self, endpoint: &str) -> &Self {
        self.push(endpoint, Scripted::NetworkFailure)
    }

    fn push(&self, endpoint: &str, scripted: Scripted) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .scripted
            .entry(endpoint.to_string())
            .or_default()
            .push_back(scripted);
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, endpoint: &str) -> Vec<Request> {
        let suffix = format!("/{}", endpoint);
        self.requests().into_iter().filter(|r| r.url.ends_with(&suffix)).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_json(&self, url: &str, bearer: Option<&str>, body: &Value) -> target_typo::Result<HttpResponse> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(Request {
            url: url.to_string(),
            bearer: bearer.map(str::to_string),
            body: body.clone(),
        });

        let endpoint = url.rsplit('/').next().unwrap_or_default().to_string();
        let scripted = inner.scripted.get_mut(&endpoint).and_then(VecDeque::pop_front);
        match scripted {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::NetworkFailure) => Err(TargetError::Network {
                url: url.to_string(),
                message: "connection refused".into(),
            }),
            None if endpoint == "token" => {
                inner.tokens_issued += 1;
                let body = json!({ "token": format!("token-{}", inner.tokens_issued) });
                Ok(HttpResponse::new(200, body.to_string()))
            }
            None => Ok(HttpResponse::new(200, "{}")),
        }
    }
}

pub fn test_config(send_threshold: usize) -> TargetConfig {
    let mut config = TargetConfig::new(
        "typo_key",
        "typo_secret",
        "https://www.mock.com/",
        "test_typo",
        send_threshold,
    );
    config.retry_base_delay_ms = 1;
    config.retry_max_delay_ms = 5;
    config
}

pub fn client(transport: &ScriptedTransport) -> DeliveryClient {
    DeliveryClient::new(&test_config(5), Box::new(transport.clone()))
}

pub fn router(transport: &ScriptedTransport, send_threshold: usize) -> MessageRouter {
    let config = test_config(send_threshold);
    MessageRouter::from_config(&config, DeliveryClient::new(&config, Box::new(transport.clone())))
}

pub fn schema_line(stream: &str, schema: Value, key_properties: &[&str]) -> String {
    json!({
        "type": "SCHEMA",
        "stream": stream,
        "schema": schema,
        "key_properties": key_properties,
    })
    .to_string()
}

pub fn record_line(stream: &str, record: Value) -> String {
    json!({ "type": "RECORD", "stream": stream, "record": record }).to_string()
}

pub fn state_line(value: Value) -> String {
    json!({ "type": "STATE", "value": value }).to_string()
}
