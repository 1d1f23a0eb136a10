use anyhow::{Context, Result};
use reqwest::Method;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::config::{Templates, default_config_dir, load_config};
use crate::error::format_api_error;
use crate::transport::{ApiRequest, ReqwestTransport, Transport};
use crate::util::urljoin;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Static API key sent in the `x-api-key` header.
    pub key: String,
    /// EarthCache API root, `https://api.skywatch.co/earthcache`.
    pub base_url: String,
    /// Archive search root, `https://api.skywatch.co/earthcache/archive`.
    pub archive_url: String,
    /// Default `max_cost` written into pipeline payloads.
    pub max_cost: f64,

    pub(crate) templates: Templates,
}

impl ClientConfig {
    /// Reads `key.txt` and the request templates from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        load_config(dir.as_ref(), 0.0)
    }
}

/// Status code and parsed JSON body of an API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    pub url: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts a non-2xx response into an error carrying the server's message.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(format_api_error(self.status, &self.url, &self.body))
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client<T = ReqwestTransport> {
    config: ClientConfig,
    progress: bool,
    transport: T,
}

impl Client<ReqwestTransport> {
    /// Creates a client from the key and templates stored in `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let config = ClientConfig::load(dir)?;
        Ok(Self::with_transport(config, ReqwestTransport::new(None)?))
    }

    /// Creates a client from `<config dir>/earthcache` (e.g. `~/.config/earthcache` on Linux).
    pub fn from_default_dir() -> Result<Self> {
        Self::new(default_config_dir()?)
    }

    /// Replaces the HTTP client with one that gives up after `timeout`.
    ///
    /// Requests never time out unless this is set.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.transport = ReqwestTransport::new(Some(timeout))?;
        Ok(self)
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            progress: false,
            transport,
        }
    }

    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.config.max_cost = max_cost;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn with_archive_url(mut self, url: impl Into<String>) -> Self {
        self.config.archive_url = url.into();
        self
    }

    /// Shows a progress bar while downloading images.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn progress(&self) -> bool {
        self.progress
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn base_endpoint(&self, path: &str) -> String {
        urljoin(&self.config.base_url, path)
    }

    pub(crate) fn archive_endpoint(&self, path: &str) -> String {
        urljoin(&self.config.archive_url, path)
    }

    /// Sends one API request with the standard header set.
    ///
    /// The response status is returned as-is; only transport failures and
    /// non-JSON bodies are errors.
    pub fn send_request(
        &self,
        method: Method,
        url: &str,
        payload: Option<&Value>,
    ) -> Result<ApiResponse> {
        let request = ApiRequest {
            method,
            url: url.to_string(),
            headers: self.header_params(),
            body: payload.cloned(),
        };

        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let raw = self.transport.send(&request)?;
        tracing::debug!(status = raw.status, url = %request.url, "received response");

        let body = parse_body(&raw.body).with_context(|| {
            format!(
                "failed to parse API JSON (url={}, status={})",
                request.url, raw.status
            )
        })?;

        Ok(ApiResponse {
            status: raw.status,
            body,
            url: request.url,
        })
    }

    pub(crate) fn get(&self, url: &str) -> Result<ApiResponse> {
        self.send_request(Method::GET, url, None)
    }

    fn header_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Accept", "application/json".to_string()),
            ("Content-Type", "application/json".to_string()),
            ("x-api-key", self.config.key.clone()),
        ]
    }
}

fn parse_body(bytes: &[u8]) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(bytes)?)
}
