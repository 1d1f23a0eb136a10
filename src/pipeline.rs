//! Pipeline endpoints.

use anyhow::Result;
use reqwest::Method;
use serde_json::{Map, Value, json};

use crate::client::{ApiResponse, Client};
use crate::config::TemplateKind;
use crate::listing::find_id_by_name;
use crate::payload::Payload;
use crate::search::TimeWindow;
use crate::transport::Transport;

/// Fields a pipeline request may carry even when the template omits them.
const PIPELINE_EXTRA_KEYS: &[&str] = &["search_id", "search_results"];

impl<T: Transport> Client<T> {
    /// `GET {base}/pipelines`
    pub fn get_pipelines(&self) -> Result<ApiResponse> {
        self.get(&self.base_endpoint("/pipelines"))
    }

    /// `GET {base}/pipelines/{id}`
    pub fn get_pipeline(&self, pipeline_id: &str) -> Result<ApiResponse> {
        self.get(&self.base_endpoint(&format!("/pipelines/{}", pipeline_id)))
    }

    /// `DELETE {base}/pipelines/{id}`
    pub fn delete_pipeline(&self, pipeline_id: &str) -> Result<ApiResponse> {
        let url = self.base_endpoint(&format!("/pipelines/{}", pipeline_id));
        let resp = self.send_request(Method::DELETE, &url, None)?;
        tracing::info!(pipeline_id, status = resp.status, "pipeline delete requested");
        Ok(resp)
    }

    /// `GET {base}/pipelines/{id}/interval_results`
    pub fn get_interval_results(&self, pipeline_id: &str) -> Result<ApiResponse> {
        self.get(&self.base_endpoint(&format!("/pipelines/{}/interval_results", pipeline_id)))
    }

    /// Builds a pipeline body for an AOI and window without sending it.
    pub fn pipeline_payload(
        &self,
        aoi: &Value,
        window: &TimeWindow,
        overrides: &Map<String, Value>,
    ) -> Result<Payload> {
        Payload::assemble(
            self.config().templates.get(TemplateKind::Pipeline),
            vec![
                ("aoi", aoi.clone()),
                ("start_date", json!(window.start_date)),
                ("end_date", json!(window.end_date)),
                ("max_cost", json!(self.config().max_cost)),
            ],
            overrides,
            PIPELINE_EXTRA_KEYS,
        )
    }

    /// `POST {base}/pipelines` for an AOI and acquisition window.
    pub fn create_pipeline(
        &self,
        aoi: &Value,
        window: &TimeWindow,
        overrides: &Map<String, Value>,
    ) -> Result<ApiResponse> {
        let payload = self.pipeline_payload(aoi, window, overrides)?;
        self.post_pipeline(&payload)
    }

    /// Builds a body that orders specific results of a finished search.
    pub fn pipeline_from_search_payload(
        &self,
        name: &str,
        search_id: &str,
        result_ids: &[String],
        overrides: &Map<String, Value>,
    ) -> Result<Payload> {
        Payload::assemble(
            self.config().templates.get(TemplateKind::PipelineSearch),
            vec![
                ("name", json!(name)),
                ("search_id", json!(search_id)),
                ("search_results", json!(result_ids)),
                ("max_cost", json!(self.config().max_cost)),
            ],
            overrides,
            &[],
        )
    }

    /// `POST {base}/pipelines` ordering results of a previous archive search.
    pub fn create_pipeline_from_search(
        &self,
        name: &str,
        search_id: &str,
        result_ids: &[String],
        overrides: &Map<String, Value>,
    ) -> Result<ApiResponse> {
        let payload = self.pipeline_from_search_payload(name, search_id, result_ids, overrides)?;
        self.post_pipeline(&payload)
    }

    /// Looks up a pipeline id by exact name. The first match wins.
    pub fn pipeline_id_by_name(&self, name: &str) -> Result<Option<String>> {
        let listing = self.get_pipelines()?.error_for_status()?;
        Ok(find_id_by_name(&listing.body, name))
    }

    fn post_pipeline(&self, payload: &Payload) -> Result<ApiResponse> {
        let url = self.base_endpoint("/pipelines");
        let resp = self.send_request(Method::POST, &url, Some(&payload.body))?;
        match resp.body.get("data").and_then(|d| d.get("id")) {
            Some(id) if resp.is_success() => {
                tracing::info!(pipeline_id = %id, "pipeline created")
            }
            _ => tracing::warn!(status = resp.status, "pipeline was not created"),
        }
        Ok(resp)
    }
}
