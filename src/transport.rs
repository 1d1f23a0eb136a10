//! HTTP transport abstraction.
//!
//! [`Client`](crate::Client) talks to the network only through [`Transport`], so
//! tests can script responses without a server.

use anyhow::{Context, Result, bail};
use reqwest::Method;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::io::Write;
use std::time::Duration;

/// A fully composed API request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

/// Raw status and body bytes of an API call.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

pub trait Transport {
    /// Performs an API call. Non-2xx statuses are not errors.
    fn send(&self, request: &ApiRequest) -> Result<RawResponse>;

    /// Streams the file at `url` into `sink`, returning the number of bytes written.
    /// Non-2xx statuses are errors.
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64>;
}

/// [`Transport`] backed by a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: HttpClient,
}

impl ReqwestTransport {
    /// `timeout` of `None` means requests may block indefinitely.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("earthcache-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("earthcache-rs")),
        );

        let http = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        let mut req = self.http.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            req = req.header(*name, value.as_str());
        }
        if let Some(body) = &request.body {
            req = req.body(serde_json::to_vec(body)?);
        }

        let resp = req
            .send()
            .with_context(|| format!("{} {} failed", request.method, request.url))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .with_context(|| format!("failed to read response body from {}", request.url))?
            .to_vec();

        Ok(RawResponse { status, body })
    }

    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        let mut resp = self
            .http
            .get(url)
            .send()
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("download failed: HTTP {} for url ({})", status.as_u16(), url);
        }

        let n = resp
            .copy_to(sink)
            .with_context(|| format!("download interrupted ({})", url))?;
        Ok(n)
    }
}
