//! Server state

use std::sync::Arc;

use crate::camera::service::CameraService;

/// Server state shared across handlers
pub struct ServerState {
    pub camera: Arc<CameraService>,
}

impl ServerState {
    pub fn new(camera: Arc<CameraService>) -> Self {
        Self { camera }
    }
}
