use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::client::ClientConfig;

pub(crate) const BASE_URL: &str = "https://api.skywatch.co/earthcache";
pub(crate) const ARCHIVE_URL: &str = "https://api.skywatch.co/earthcache/archive";

const KEY_FILE: &str = "key.txt";

/// Request templates, in the order they are looked up on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TemplateKind {
    Search,
    Pipeline,
    PipelineSearch,
}

impl TemplateKind {
    pub(crate) const ALL: [TemplateKind; 3] = [
        TemplateKind::Search,
        TemplateKind::Pipeline,
        TemplateKind::PipelineSearch,
    ];

    pub(crate) fn file_name(self) -> &'static str {
        match self {
            TemplateKind::Search => "search.json",
            TemplateKind::Pipeline => "pipeline.json",
            TemplateKind::PipelineSearch => "pipeline_search.json",
        }
    }

    fn required(self) -> bool {
        !matches!(self, TemplateKind::PipelineSearch)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Templates {
    pub(crate) search: Map<String, Value>,
    pub(crate) pipeline: Map<String, Value>,
    pub(crate) pipeline_search: Map<String, Value>,
}

impl Templates {
    pub(crate) fn get(&self, kind: TemplateKind) -> &Map<String, Value> {
        match kind {
            TemplateKind::Search => &self.search,
            TemplateKind::Pipeline => &self.pipeline,
            TemplateKind::PipelineSearch => &self.pipeline_search,
        }
    }

    fn slot(&mut self, kind: TemplateKind) -> &mut Map<String, Value> {
        match kind {
            TemplateKind::Search => &mut self.search,
            TemplateKind::Pipeline => &mut self.pipeline,
            TemplateKind::PipelineSearch => &mut self.pipeline_search,
        }
    }
}

pub(crate) fn load_config(dir: &Path, max_cost: f64) -> Result<ClientConfig> {
    if !dir.is_dir() {
        bail!(
            "Missing configuration directory {} (expected {} and request templates)",
            dir.display(),
            KEY_FILE
        );
    }

    let key_path = dir.join(KEY_FILE);
    let text = std::fs::read_to_string(&key_path)
        .with_context(|| format!("failed to read API key file {}", key_path.display()))?;
    let key = read_key(&text)
        .with_context(|| format!("API key file {} is empty", key_path.display()))?;

    let mut templates = Templates::default();
    for kind in TemplateKind::ALL {
        let path = dir.join(kind.file_name());
        if !path.exists() {
            if kind.required() {
                bail!("Missing request template {}", path.display());
            }
            tracing::debug!(path = %path.display(), "optional template not present, using empty object");
            continue;
        }
        *templates.slot(kind) = read_template(&path)?;
    }

    Ok(ClientConfig {
        key,
        base_url: BASE_URL.to_string(),
        archive_url: ARCHIVE_URL.to_string(),
        templates,
        max_cost,
    })
}

pub(crate) fn default_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("earthcache"))
        .context("could not determine the platform configuration directory")
}

fn read_key(text: &str) -> Option<String> {
    // Only the first non-blank line counts; the trailing newline must not reach the header.
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

fn read_template(path: &Path) -> Result<Map<String, Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read request template {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("request template {} is not valid JSON", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => bail!(
            "request template {} must be a JSON object, found {}",
            path.display(),
            json_kind(&other)
        ),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
