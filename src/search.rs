//! Archive search: submit, check status, and poll until done.

use anyhow::{Result, bail};
use reqwest::Method;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::client::{ApiResponse, Client};
use crate::config::TemplateKind;
use crate::payload::Payload;
use crate::transport::Transport;

/// Status the archive returns while a search is still running.
pub const STATUS_PROCESSING: u16 = 202;

pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(2);

/// Acquisition window copied into search and pipeline payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_date: String,
    pub end_date: String,
}

impl TimeWindow {
    pub fn new(start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        Self {
            start_date: start_date.into(),
            end_date: end_date.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Pause between status checks.
    pub delay: Duration,
    /// Give up once this much time has passed since the first check.
    pub timeout: Option<Duration>,
    /// Stop polling when set to `true` from another thread.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            delay: DEFAULT_POLL_DELAY,
            timeout: None,
            cancel: None,
        }
    }
}

impl PollOptions {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }
}

/// Result of a submitted search.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedSearch {
    /// Present when the archive accepted the search (HTTP 200 with `data.id`).
    pub search_id: Option<String>,
    pub response: ApiResponse,
}

/// Final state of [`Client::process_search`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub search_id: Option<String>,
    /// Last status seen: the results status, or the submission status if the search was rejected.
    pub status: u16,
    pub body: Value,
    /// Number of status checks issued.
    pub checks: usize,
}

impl<T: Transport> Client<T> {
    /// Builds the archive search body without sending it.
    pub fn search_payload(
        &self,
        aoi: &Value,
        window: &TimeWindow,
        overrides: &Map<String, Value>,
    ) -> Result<Payload> {
        Payload::assemble(
            self.config().templates.get(TemplateKind::Search),
            vec![
                ("location", aoi.clone()),
                ("start_date", json!(window.start_date)),
                ("end_date", json!(window.end_date)),
            ],
            overrides,
            &[],
        )
    }

    /// `POST {archive}/search`.
    pub fn post_search(
        &self,
        aoi: &Value,
        window: &TimeWindow,
        overrides: &Map<String, Value>,
    ) -> Result<SubmittedSearch> {
        let payload = self.search_payload(aoi, window, overrides)?;
        let url = self.archive_endpoint("/search");
        let response = self.send_request(Method::POST, &url, Some(&payload.body))?;

        let search_id = if response.status == 200 {
            response
                .body
                .get("data")
                .and_then(|d| d.get("id"))
                .and_then(|id| match id {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
        } else {
            None
        };

        match &search_id {
            Some(id) => tracing::info!(search_id = %id, "search submitted"),
            None => tracing::warn!(status = response.status, "search was not accepted"),
        }

        Ok(SubmittedSearch {
            search_id,
            response,
        })
    }

    /// `GET {archive}/search/{id}/search_results`. Returns 202 while the search runs.
    pub fn get_search(&self, search_id: &str) -> Result<ApiResponse> {
        let url = self.archive_endpoint(&format!("/search/{}/search_results", search_id));
        self.get(&url)
    }

    /// Submits a search and polls its results until the status is no longer 202.
    pub fn process_search(
        &self,
        aoi: &Value,
        window: &TimeWindow,
        overrides: &Map<String, Value>,
        poll: &PollOptions,
    ) -> Result<SearchOutcome> {
        let submitted = self.post_search(aoi, window, overrides)?;
        let Some(search_id) = submitted.search_id else {
            return Ok(SearchOutcome {
                search_id: None,
                status: submitted.response.status,
                body: submitted.response.body,
                checks: 0,
            });
        };

        self.wait_for_search(&search_id, poll)
    }

    /// Polls an already submitted search.
    pub fn wait_for_search(&self, search_id: &str, poll: &PollOptions) -> Result<SearchOutcome> {
        let started = Instant::now();
        let mut checks = 0usize;

        loop {
            if poll.cancelled() {
                bail!("polling of search {} cancelled after {} check(s)", search_id, checks);
            }

            let response = self.get_search(search_id)?;
            checks += 1;

            if response.status != STATUS_PROCESSING {
                tracing::info!(search_id, status = response.status, checks, "search finished");
                return Ok(SearchOutcome {
                    search_id: Some(search_id.to_string()),
                    status: response.status,
                    body: response.body,
                    checks,
                });
            }

            if let Some(timeout) = poll.timeout {
                if started.elapsed() + poll.delay > timeout {
                    bail!(
                        "search {} still processing after {} check(s) ({:?} timeout)",
                        search_id,
                        checks,
                        timeout
                    );
                }
            }

            tracing::debug!(search_id, checks, "search still processing");
            thread::sleep(poll.delay);
        }
    }
}
