//! Camera API models

use serde::{Deserialize, Serialize};

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Result of a capture request or a latest-capture lookup.
///
/// Exactly one of `filename` and `error` is present on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaptureResponse {
    pub fn ok(filename: impl Into<String>) -> Self {
        Self {
            success: true,
            filename: Some(filename.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            filename: None,
            error: Some(error.into()),
        }
    }
}

/// Camera info response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraInfoResponse {
    pub is_v3: bool,
    pub info: String,
    #[serde(rename = "type")]
    pub camera_type: String,
    /// Current device mode (streaming, still, stopped, faulted)
    pub mode: String,
}
