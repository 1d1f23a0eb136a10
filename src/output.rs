//! Output (delivery format) endpoints.

use anyhow::Result;

use crate::client::{ApiResponse, Client};
use crate::listing::find_id_by_name;
use crate::transport::Transport;

impl<T: Transport> Client<T> {
    /// `GET {base}/outputs`
    pub fn get_outputs(&self) -> Result<ApiResponse> {
        self.get(&self.base_endpoint("/outputs"))
    }

    /// `GET {base}/outputs/{id}`
    pub fn get_output(&self, output_id: &str) -> Result<ApiResponse> {
        self.get(&self.base_endpoint(&format!("/outputs/{}", output_id)))
    }

    /// Looks up an output id by exact name. The first match wins.
    pub fn output_id_by_name(&self, name: &str) -> Result<Option<String>> {
        let listing = self.get_outputs()?.error_for_status()?;
        Ok(find_id_by_name(&listing.body, name))
    }
}
