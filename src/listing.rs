//! Helpers over the `{"data": [...]}` listings returned by the API.

use serde_json::Value;

/// One downloadable result: a metadata file and the imagery it describes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ResultRecord {
    #[serde(default, deserialize_with = "id_string")]
    pub id: Option<String>,
    pub metadata_url: String,
    pub analytics_url: String,
}

impl ResultRecord {
    pub fn new(metadata_url: impl Into<String>, analytics_url: impl Into<String>) -> Self {
        Self {
            id: None,
            metadata_url: metadata_url.into(),
            analytics_url: analytics_url.into(),
        }
    }
}

/// Returns the `id` of the first `data[]` entry whose `name` equals `name`.
pub(crate) fn find_id_by_name(body: &Value, name: &str) -> Option<String> {
    data(body)
        .iter()
        .find(|item| item.get("name").and_then(Value::as_str) == Some(name))
        .and_then(|item| item.get("id"))
        .and_then(value_to_id)
}

/// Flattens `data[].results[]` of an interval-results response.
pub fn records_from_interval_results(body: &Value) -> Vec<ResultRecord> {
    data(body)
        .iter()
        .flat_map(|interval| {
            interval
                .get("results")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default()
        })
        .filter_map(to_record)
        .collect()
}

/// Reads `data[]` of an outputs listing (or a single output wrapped in `data`).
pub fn records_from_outputs(body: &Value) -> Vec<ResultRecord> {
    match body.get("data") {
        Some(Value::Object(_)) => body.get("data").and_then(to_record).into_iter().collect(),
        _ => data(body).iter().filter_map(to_record).collect(),
    }
}

fn data(body: &Value) -> &[Value] {
    body.get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn to_record(item: &Value) -> Option<ResultRecord> {
    match serde_json::from_value::<ResultRecord>(item.clone()) {
        Ok(r) => Some(r),
        Err(e) => {
            tracing::warn!(error = %e, "skipping result without metadata/analytics urls");
            None
        }
    }
}

fn value_to_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v: Option<Value> = serde::Deserialize::deserialize(de)?;
    Ok(v.as_ref().and_then(value_to_id))
}
