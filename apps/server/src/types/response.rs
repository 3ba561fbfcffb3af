// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response types for the API.

use ifc_recolor_core::RestyleStats;
use serde::{Deserialize, Serialize};

/// Successful `POST /api/update_ifc` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub status: &'static str,
    pub message: &'static str,
    /// Key of the patched model in the disk cache.
    pub cache_key: String,
    /// Where the patched model can be downloaded.
    pub download_url: String,
    /// Grid rows dropped because their color was not a hex color.
    pub skipped_colors: usize,
    #[serde(flatten)]
    pub stats: RestyleStats,
    /// New version id when the model was uploaded back to APS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_version: Option<String>,
    /// Total processing time (ms).
    pub total_time_ms: u64,
}

/// Stored alongside each patched model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub project_id: String,
    pub version_id: String,
    /// Size of the recolored file in bytes.
    pub size: usize,
    pub missing_global_ids: Vec<String>,
    pub uploaded_version: Option<String>,
}
