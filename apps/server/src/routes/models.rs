// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recolored model retrieval endpoints.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::ApiError;
use crate::types::ModelRecord;
use crate::AppState;

/// GET /api/v1/models/:key - Download a recolored model.
pub async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    tracing::debug!(key = %key, "Model lookup");

    let data = state
        .cache
        .get_model(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Model not found: {}", key)))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        state.config.upload_file_name.replace('"', "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/x-step".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

/// GET /api/v1/models/:key/record - Details of a recolored model.
pub async fn record(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ModelRecord>, ApiError> {
    state
        .cache
        .get_record::<ModelRecord>(&key)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Model not found: {}", key)))
}
