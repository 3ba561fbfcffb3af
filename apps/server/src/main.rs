// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC Recolor Server - writes grid colors back into IFC models.
//!
//! The viewer front-end posts the saved grid (colors keyed by IFC GlobalId)
//! here. The server downloads the model version from Autodesk Platform
//! Services, attaches surface styles to the listed elements, caches the
//! result and can upload it back as a new version.
//!
//! # Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `POST /api/update_ifc` - Recolor a model version
//! - `GET /api/v1/models/:key` - Download a recolored model
//! - `GET /api/v1/models/:key/record` - Details of a recolored model

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

mod config;
mod error;
mod routes;
mod services;
mod types;

use config::Config;
use services::{ApsClient, DiskCache};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<DiskCache>,
    pub config: Arc<Config>,
    pub aps: Arc<ApsClient>,
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_permissive() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the router with all routes and middleware.
fn app(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        // Root endpoint - API information
        .route("/", get(routes::health::info))
        // Health check
        .route("/api/v1/health", get(routes::health::check))
        // Recolor endpoint, path kept for existing front-ends
        .route("/api/update_ifc", post(routes::recolor::update_ifc))
        // Recolored models
        .route("/api/v1/models/:key", get(routes::models::download))
        .route("/api/v1/models/:key/record", get(routes::models::record))
        // Middleware
        .layer(DefaultBodyLimit::max(config.max_body_size_mb * 1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,ifc_recolor_server=debug".into()),
        )
        .pretty()
        .init();

    let config = Config::from_env();

    tracing::info!(
        port = config.port,
        cache_dir = %config.cache_dir,
        max_body_size_mb = config.max_body_size_mb,
        aps_base_url = %config.aps_base_url,
        upload_to_cloud = config.upload_to_cloud,
        "Starting IFC Recolor Server"
    );

    let state = AppState {
        cache: Arc::new(DiskCache::new(&config.cache_dir).await),
        aps: Arc::new(ApsClient::new(&config.aps_base_url)),
        config: Arc::new(config.clone()),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn test_app(name: &str) -> Router {
        let dir = std::env::temp_dir()
            .join(format!("ifc-recolor-app-{}-{}", name, std::process::id()))
            .to_string_lossy()
            .into_owned();
        let config = Config::from_lookup(|var| match var {
            "CACHE_DIR" => Some(dir.clone()),
            "APS_BASE_URL" => Some("http://127.0.0.1:9".into()),
            _ => None,
        });
        app(AppState {
            cache: Arc::new(DiskCache::new(&config.cache_dir).await),
            aps: Arc::new(ApsClient::new(&config.aps_base_url)),
            config: Arc::new(config),
        })
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health() {
        let response = test_app("health")
            .await
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["upload_to_cloud"], false);
    }

    #[tokio::test]
    async fn missing_version_is_a_bad_request() {
        let request = Request::post("/api/update_ifc")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"projectID":"b.1","accessToken":"t","elements":[]}"#,
            ))
            .unwrap();
        let response = test_app("validate").await.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "versionId is required");
        assert_eq!(body["code"], "MISSING_FIELD");
    }

    #[tokio::test]
    async fn unreachable_aps_is_a_gateway_error() {
        let request = Request::post("/api/update_ifc")
            .header("content-type", "application/json")
            .body(Body::from(
                r##"{"versionID":"urn:v?version=1","projectID":"b.1","accessToken":"t",
                    "elements":[{"ifcGUIDs":["2O2Fr$t4X7Zf8NOew3FLOH"],"color":"#ff0000"}]}"##,
            ))
            .unwrap();
        let response = test_app("gateway").await.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["code"], "APS_ERROR");
    }

    #[tokio::test]
    async fn unknown_model_is_not_found() {
        let response = test_app("missing")
            .await
            .oneshot(
                Request::get("/api/v1/models/0123abcd")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
