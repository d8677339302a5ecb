//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Service settings, read from an optional JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rolling log files; stdout only when absent
    #[serde(default)]
    pub log_dir: Option<String>,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Directory that still captures are written to
    #[serde(default = "default_capture_dir")]
    pub capture_dir: String,

    /// Camera configuration
    #[serde(default)]
    pub camera: CameraSettings,
}

fn default_capture_dir() -> String {
    "captures".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            server: ServerSettings::default(),
            capture_dir: default_capture_dir(),
            camera: CameraSettings::default(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which camera driver backs the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// rpicam-apps command line tools
    #[default]
    Rpicam,
    /// In-process simulated camera
    Simulated,
}

/// Camera settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSettings {
    #[serde(default)]
    pub driver: DriverKind,

    /// Command used to enumerate cameras
    #[serde(default = "default_list_command")]
    pub list_command: String,

    /// Command used for MJPEG streaming
    #[serde(default = "default_video_command")]
    pub video_command: String,

    /// Command used for still captures
    #[serde(default = "default_still_command")]
    pub still_command: String,

    /// Autofocus settle time before a still capture, in milliseconds
    #[serde(default = "default_af_settle_ms")]
    pub af_settle_ms: u64,

    /// Identification string reported by the simulated driver
    #[serde(default = "default_simulated_info")]
    pub simulated_info: String,
}

fn default_list_command() -> String {
    "rpicam-hello".to_string()
}

fn default_video_command() -> String {
    "rpicam-vid".to_string()
}

fn default_still_command() -> String {
    "rpicam-still".to_string()
}

fn default_af_settle_ms() -> u64 {
    500
}

fn default_simulated_info() -> String {
    "0 : imx708 [4608x2592 10-bit RGGB] (simulated)".to_string()
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            driver: DriverKind::default(),
            list_command: default_list_command(),
            video_command: default_video_command(),
            still_command: default_still_command(),
            af_settle_ms: default_af_settle_ms(),
            simulated_info: default_simulated_info(),
        }
    }
}
