//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    response::{Html, IntoResponse, Response},
    Json,
};
use http::{header, StatusCode};
use openapi_server::models::{
    CameraInfoResponse, CaptureResponse, HealthResponse, VersionResponse,
};
use tracing::{debug, error};

use crate::camera::profile::SensorProfile;
use crate::errors::ServiceError;
use crate::server::state::ServerState;
use crate::server::stream::{frame_stream, stream_content_type};
use crate::utils::version_info;

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.html");

/// Render the landing page for the detected camera
pub fn render_index(profile: SensorProfile) -> String {
    INDEX_TEMPLATE
        .replace("{{ camera_type }}", profile.display_name())
        .replace("{{ is_v3 }}", if profile.is_v3() { "true" } else { "false" })
}

/// Map a failure to `{success: false, error}` with 404 for missing items and
/// 500 for everything else
fn failure_response(err: &ServiceError) -> Response {
    let status = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let message = match err {
        ServiceError::NotFound(msg) => msg.clone(),
        other => other.to_string(),
    };
    (status, Json(CaptureResponse::failed(message))).into_response()
}

/// Landing page handler
pub async fn index_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Html(render_index(state.camera.profile()))
}

/// Live MJPEG stream handler
pub async fn video_feed_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    debug!("Video stream opened");
    (
        [
            (header::CONTENT_TYPE, stream_content_type()),
            (header::CACHE_CONTROL, "no-cache, private".to_string()),
        ],
        Body::from_stream(frame_stream(state.camera.clone())),
    )
}

/// Still capture handler
pub async fn capture_handler(State(state): State<Arc<ServerState>>) -> Response {
    let still = state.camera.capture_still().await;
    match still.result {
        Ok(filename) => Json(CaptureResponse::ok(filename)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(CaptureResponse::failed(e.to_string())),
        )
            .into_response(),
    }
}

/// Latest capture handler
pub async fn latest_capture_handler(State(state): State<Arc<ServerState>>) -> Response {
    match state.camera.captures().latest_capture().await {
        Ok(filename) => Json(CaptureResponse::ok(filename)).into_response(),
        Err(e) => {
            if !e.is_not_found() {
                error!("Failed to list captures: {}", e);
            }
            failure_response(&e)
        }
    }
}

/// Capture file handler
pub async fn capture_file_handler(
    State(state): State<Arc<ServerState>>,
    Path(filename): Path<String>,
) -> Response {
    let result = async {
        let file = state.camera.captures().resolve(&filename).await?;
        file.read_bytes().await
    }
    .await;

    match result {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type_for(&filename))], bytes).into_response(),
        Err(e) => failure_response(&e),
    }
}

fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

/// Camera info handler
pub async fn camera_info_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let profile = state.camera.profile();
    Json(CameraInfoResponse {
        is_v3: profile.is_v3(),
        info: state.camera.info().to_string(),
        camera_type: profile.display_name().to_string(),
        mode: state.camera.mode().await.to_string(),
    })
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "picam".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}
