//! A small blocking Rust client for the SkyWatch EarthCache API.
//!
//! The client covers the archive search flow (submit a search, poll until the
//! results are ready), pipeline management (create, list, inspect, delete,
//! interval results), outputs, and downloading result imagery into
//! directories named after each acquisition time.
//!
//! ## Quick start
//! - Put your API key in `key.txt` and the request templates `search.json` and
//!   `pipeline.json` (optionally `pipeline_search.json`) in one directory.
//! - Build a [`Client`] from that directory and call its endpoint methods.
//!
//! ```no_run
//! use anyhow::Result;
//! use earthcache::{Client, PollOptions, TimeWindow};
//! use serde_json::{Map, json};
//!
//! fn main() -> Result<()> {
//!     let client = Client::new("config")?;
//!     let aoi = json!({
//!         "type": "Polygon",
//!         "coordinates": [[[-1.6, 54.9], [-1.5, 54.9], [-1.5, 55.0], [-1.6, 55.0], [-1.6, 54.9]]]
//!     });
//!     let outcome = client.process_search(
//!         &aoi,
//!         &TimeWindow::new("2024-03-01", "2024-03-31"),
//!         &Map::new(),
//!         &PollOptions::default(),
//!     )?;
//!     println!("search finished with HTTP {}", outcome.status);
//!     Ok(())
//! }
//! ```
//!
//! Responses are returned as status code plus parsed JSON; non-2xx statuses
//! are not errors. Use [`ApiResponse::error_for_status`] to turn them into one.

#![forbid(unsafe_code)]

mod client;
mod config;
mod download;
mod error;
mod listing;
mod output;
mod payload;
mod pipeline;
mod search;
mod transport;
mod util;

pub use client::{ApiResponse, Client, ClientConfig};
pub use download::{
    DEFAULT_TIMESTAMP_FIELD, DIRECTORY_FORMAT, DownloadOptions, DownloadReport, FileOutcome,
    directory_name, parse_acquisition_time,
};
pub use listing::{ResultRecord, records_from_interval_results, records_from_outputs};
pub use payload::Payload;
pub use search::{
    DEFAULT_POLL_DELAY, PollOptions, STATUS_PROCESSING, SearchOutcome, SubmittedSearch,
    TimeWindow,
};
pub use transport::{ApiRequest, RawResponse, ReqwestTransport, Transport};
