//! `ureq`-backed transport
//!
//! `ureq` is a blocking client; each request runs on tokio's blocking pool so
//! callers can await it without stalling the runtime.

use crate::transport::{CouchTransport, HttpRequest, Method};
use async_trait::async_trait;
use base64::Engine;
use divan_core::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Default CouchDB endpoint.
pub const DEFAULT_URL: &str = "http://127.0.0.1:5984";

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Connection settings for a CouchDB server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server root URL (e.g. "http://127.0.0.1:5984")
    #[serde(default = "default_url")]
    pub url: String,
    /// Basic auth user name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Basic auth password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Global request timeout in milliseconds (default: 10000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            url: default_url(),
            username: None,
            password: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ConnectionConfig {
    /// Settings for `url` with no credentials.
    pub fn new(url: &str) -> Self {
        ConnectionConfig {
            url: url.to_string(),
            ..Self::default()
        }
    }

    /// Add basic auth credentials.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        self
    }

    /// `Authorization` header value, if credentials are set.
    pub fn authorization(&self) -> Option<String> {
        let username = self.username.as_deref()?;
        let password = self.password.as_deref().unwrap_or("");
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", username, password));
        Some(format!("Basic {}", token))
    }
}

/// Transport that talks to a real server over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    base: String,
    authorization: Option<String>,
}

impl HttpTransport {
    /// Build a transport from connection settings.
    pub fn new(config: &ConnectionConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_millis(config.timeout_ms)))
            .http_status_as_error(false)
            .build();
        HttpTransport {
            agent: ureq::Agent::new_with_config(agent_config),
            base: config.url.trim_end_matches('/').to_string(),
            authorization: config.authorization(),
        }
    }

    /// Absolute URL for an encoded relative path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn execute_blocking(&self, request: HttpRequest) -> Result<Value, TransportError> {
        let url = self.url_for(&request.path);
        let body = match &request.body {
            Some(body) => serde_json::to_vec(body)
                .map_err(|e| TransportError::Decode(format!("failed to serialize request: {}", e)))?,
            None => Vec::new(),
        };

        let result = match request.method {
            Method::Get => {
                let mut req = self.agent.get(&url).header("Accept", "application/json");
                if let Some(auth) = &self.authorization {
                    req = req.header("Authorization", auth);
                }
                req.call()
            }
            Method::Put | Method::Post => {
                let mut req = if request.method == Method::Put {
                    self.agent.put(&url)
                } else {
                    self.agent.post(&url)
                };
                req = req
                    .header("Accept", "application/json")
                    .header("Content-Type", "application/json");
                if let Some(auth) = &self.authorization {
                    req = req.header("Authorization", auth);
                }
                req.send(&body[..])
            }
        };

        let mut response = result.map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError::Network(format!("failed to read response: {}", e)))?;

        if (200..300).contains(&status) {
            serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
        } else {
            Err(status_error(status, &text))
        }
    }
}

/// Build a `Status` error from a non-2xx response body.
///
/// CouchDB answers errors with `{"error": ..., "reason": ...}`; anything else
/// is reported with the raw text as the reason.
pub fn status_error(status: u16, text: &str) -> TransportError {
    let parsed: Option<Value> = serde_json::from_str(text).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    TransportError::Status {
        status,
        error: field("error").unwrap_or_else(|| format!("http_{}", status)),
        reason: field("reason").unwrap_or_else(|| text.chars().take(200).collect()),
    }
}

#[async_trait]
impl CouchTransport for HttpTransport {
    async fn execute(&self, request: HttpRequest) -> Result<Value, TransportError> {
        let this = self.clone();
        let method = request.method;
        let path = request.path.clone();
        let result = tokio::task::spawn_blocking(move || this.execute_blocking(request))
            .await
            .map_err(|e| TransportError::Network(format!("request task failed: {}", e)))?;
        if let Err(e) = &result {
            tracing::debug!(
                target: "divan::gateway",
                method = %method,
                path = %path,
                error = %e,
                "Request failed"
            );
        }
        result
    }
}
