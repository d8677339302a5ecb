//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::camera::rpicam::RpicamOptions;
use crate::camera::service::CameraOptions;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Server configuration
    pub server: ServerOptions,

    /// Directory still captures are written to
    pub capture_dir: PathBuf,

    /// Camera driver selection
    pub driver: DriverOptions,

    /// Camera service options
    pub camera: CameraOptions,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            server: ServerOptions::default(),
            capture_dir: PathBuf::from("captures"),
            driver: DriverOptions::default(),
            camera: CameraOptions::default(),
            max_shutdown_delay: Duration::from_secs(10),
        }
    }
}

/// Camera driver selection
#[derive(Debug, Clone)]
pub enum DriverOptions {
    /// rpicam-apps command line tools
    Rpicam(RpicamOptions),
    /// Simulated camera reporting the given identification string
    Simulated { info: String },
}

impl Default for DriverOptions {
    fn default() -> Self {
        DriverOptions::Rpicam(RpicamOptions::default())
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}
