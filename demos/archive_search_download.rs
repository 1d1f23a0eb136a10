use anyhow::{Result, bail};
use earthcache::{Client, PollOptions, TimeWindow, records_from_interval_results};
use serde_json::{Map, json};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Expects key.txt, search.json and pipeline.json under ./config.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = Client::new("config")?.with_max_cost(50.0).with_progress(true);

    let aoi = json!({
        "type": "Polygon",
        "coordinates": [[
            [-122.52, 37.70], [-122.35, 37.70], [-122.35, 37.83], [-122.52, 37.83], [-122.52, 37.70]
        ]]
    });
    let window = TimeWindow::new("2024-03-01", "2024-03-31");

    let outcome = client.process_search(&aoi, &window, &Map::new(), &PollOptions::default())?;
    if outcome.status != 200 {
        bail!("search failed with HTTP {}: {}", outcome.status, outcome.body);
    }

    let Some(pipeline_id) = client.pipeline_id_by_name("bay-area-monthly")? else {
        bail!("no pipeline named bay-area-monthly");
    };

    let results = client.get_interval_results(&pipeline_id)?.error_for_status()?;
    let records = records_from_interval_results(&results.body);
    client.download_images(&records, Path::new("imagery"))?;
    Ok(())
}
