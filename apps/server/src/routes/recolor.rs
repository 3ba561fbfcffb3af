// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recolor endpoint: grid colors into the stored IFC model.

use std::time::Instant;

use axum::{extract::State, Json};
use bytes::Bytes;
use ifc_recolor_core::{restyle, RecolorPlan, RestyleStats, StepFile};

use crate::error::ApiError;
use crate::services::DiskCache;
use crate::types::{ModelRecord, SaveRequest, UpdateResponse};
use crate::AppState;

/// Check the fields every save must carry, in the order clients expect.
pub fn validate(request: &SaveRequest) -> Result<(), ApiError> {
    let fields = [
        ("versionId", &request.version_id),
        ("projectId", &request.project_id),
        ("accessToken", &request.access_token),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(ApiError::MissingField(name));
        }
    }
    Ok(())
}

/// Restyle downloaded model bytes off the async runtime.
pub async fn patch_model(
    model: Bytes,
    plan: RecolorPlan,
) -> Result<(Vec<u8>, RestyleStats), ApiError> {
    let patched = tokio::task::spawn_blocking(move || -> ifc_recolor_core::Result<_> {
        let file = StepFile::parse(model.to_vec())?;
        restyle(&file, &plan)
    })
    .await??;
    Ok(patched)
}

/// POST /api/update_ifc - Apply saved grid colors to a model version.
pub async fn update_ifc(
    State(state): State<AppState>,
    Json(request): Json<SaveRequest>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let start = Instant::now();
    validate(&request)?;

    let plan = RecolorPlan::from_elements(&request.elements);
    tracing::info!(
        project_id = %request.project_id,
        version_id = %request.version_id,
        colors = plan.entries.len(),
        global_ids = plan.global_id_count(),
        skipped = plan.skipped,
        "Recolor request"
    );

    let (version, bytes) = state
        .aps
        .download_model(&request.project_id, &request.version_id, &request.access_token)
        .await?;
    let (patched, stats) = patch_model(bytes, plan.clone()).await?;

    let cache_key = DiskCache::model_key(&request.project_id, &request.version_id);
    state.cache.set_model(&cache_key, &patched).await?;
    let size = patched.len();

    let uploaded_version = if state.config.upload_to_cloud {
        let item_id = version.item_id.as_deref().ok_or_else(|| {
            ApiError::Aps("Version has no item relationship to upload to".into())
        })?;
        Some(
            state
                .aps
                .upload_new_version(
                    &request.project_id,
                    item_id,
                    &state.config.upload_file_name,
                    patched.into(),
                    &request.access_token,
                )
                .await?,
        )
    } else {
        None
    };

    let record = ModelRecord {
        project_id: request.project_id.clone(),
        version_id: request.version_id.clone(),
        size,
        missing_global_ids: stats.missing_global_ids.clone(),
        uploaded_version: uploaded_version.clone(),
    };
    state.cache.set_record(&cache_key, &record).await?;

    let total_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        cache_key = %cache_key,
        found = stats.elements_found,
        missing = stats.missing_global_ids.len(),
        total_time_ms,
        "Model recolored"
    );

    Ok(Json(UpdateResponse {
        status: "success",
        message: "IFC file updated successfully.",
        download_url: format!("/api/v1/models/{}", cache_key),
        cache_key,
        skipped_colors: plan.skipped,
        stats,
        uploaded_version,
        total_time_ms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(version: &str, project: &str, token: &str) -> SaveRequest {
        SaveRequest {
            version_id: version.into(),
            project_id: project.into(),
            elements: vec![],
            access_token: token.into(),
        }
    }

    #[tokio::test]
    async fn patches_models_with_latin1_bytes() {
        let mut model = b"ISO-10303-21;\nHEADER;\nFILE_SCHEMA(('IFC2X3'));\nENDSEC;\nDATA;\n\
#1=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$,'W"
            .to_vec();
        model.push(0xFC);
        model.extend_from_slice(
            b"rfel',$,$,$,$,#2,$);\n#2=IFCPRODUCTDEFINITIONSHAPE($,$,(#3));\n\
#3=IFCSHAPEREPRESENTATION($,'Body','Brep',(#4));\n#4=IFCFACETEDBREP($);\n\
ENDSEC;\nEND-ISO-10303-21;\n",
        );
        let plan = RecolorPlan::from_elements(&[ifc_recolor_core::ElementColor {
            external_ids: vec!["2O2Fr$t4X7Zf8NOew3FLOH".into()],
            color: "#ff0000".into(),
        }]);

        let (patched, stats) = patch_model(Bytes::from(model.clone()), plan).await.unwrap();
        assert_eq!(stats.styled_items_created, 1);
        assert!(patched.starts_with(&model[..model.len() - "ENDSEC;\nEND-ISO-10303-21;\n".len()]));
        assert!(patched.contains(&0xFC));
    }

    #[test]
    fn validation_reports_the_first_missing_field() {
        assert!(validate(&request("v", "p", "t")).is_ok());
        assert_eq!(
            validate(&request("", "", "")).unwrap_err().to_string(),
            "versionId is required"
        );
        assert_eq!(
            validate(&request("v", " ", "t")).unwrap_err().to_string(),
            "projectId is required"
        );
        assert_eq!(
            validate(&request("v", "p", "")).unwrap_err().to_string(),
            "accessToken is required"
        );
    }
}
