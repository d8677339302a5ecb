//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::{AppOptions, DriverOptions};
use crate::camera::driver::CameraDriver;
use crate::camera::rpicam::RpicamDriver;
use crate::camera::service::CameraService;
use crate::camera::simulated::SimulatedDriver;
use crate::errors::ServiceError;
use crate::filesys::dir::Dir;
use crate::storage::captures::CaptureStore;

/// Main application state
pub struct AppState {
    /// The camera, owned for the lifetime of the process
    pub camera: Arc<CameraService>,
}

impl AppState {
    /// Initialize application state: capture directory and camera
    pub async fn init(options: &AppOptions) -> Result<Self, ServiceError> {
        info!("Initializing application state...");

        let captures = CaptureStore::new(Dir::new(options.capture_dir.clone()));
        captures.setup().await?;
        info!("Saving captures to {}", options.capture_dir.display());

        let camera = CameraService::open(
            build_driver(&options.driver),
            captures,
            options.camera.clone(),
        )
        .await?;

        Ok(Self {
            camera: Arc::new(camera),
        })
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Shutting down application state...");
        self.camera.shutdown().await
    }
}

fn build_driver(options: &DriverOptions) -> Box<dyn CameraDriver> {
    match options {
        DriverOptions::Rpicam(rpicam) => Box::new(RpicamDriver::new(rpicam.clone())),
        DriverOptions::Simulated { info } => {
            info!("Using simulated camera");
            Box::new(SimulatedDriver::new(info.clone()))
        }
    }
}
