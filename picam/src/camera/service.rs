//! Camera service: sole owner of the camera device.
//!
//! Every device operation goes through one async mutex. A still capture holds
//! it across the whole stop/configure/start sequence, so frame reads for the
//! live stream wait until the device is back in streaming mode. Capture
//! numbers are handed out under the same lock.

use std::fmt;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::camera::driver::{CameraDriver, CaptureConfig};
use crate::camera::profile::SensorProfile;
use crate::errors::ServiceError;
use crate::storage::captures::{capture_filename, CaptureStore};

/// Camera service options
#[derive(Debug, Clone)]
pub struct CameraOptions {
    /// Time to let autofocus converge before a still on autofocus sensors
    pub af_settle: Duration,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            af_settle: Duration::from_millis(500),
        }
    }
}

/// What the device is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    Streaming,
    Still,
    Stopped,
    /// Returning to streaming after a still failed; the next still capture
    /// retries the restore
    Faulted,
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceMode::Streaming => "streaming",
            DeviceMode::Still => "still",
            DeviceMode::Stopped => "stopped",
            DeviceMode::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

/// Outcome of restoring the streaming configuration after a still
#[derive(Debug)]
pub enum Recovery {
    /// The device was never touched
    NotNeeded,
    Restored,
    Failed(ServiceError),
}

/// Two-stage result of a still capture: the capture itself and the attempt
/// to put the device back into streaming mode
#[derive(Debug)]
pub struct StillCapture {
    /// File name of the new capture
    pub result: Result<String, ServiceError>,
    pub recovery: Recovery,
}

struct Device {
    driver: Box<dyn CameraDriver>,
    mode: DeviceMode,
    last_issued: u64,
}

/// Camera service
pub struct CameraService {
    profile: SensorProfile,
    info: String,
    streaming: CaptureConfig,
    still: CaptureConfig,
    options: CameraOptions,
    captures: CaptureStore,
    device: Mutex<Device>,
}

impl CameraService {
    /// Identify the camera, pick its configurations and start streaming
    pub async fn open(
        mut driver: Box<dyn CameraDriver>,
        captures: CaptureStore,
        options: CameraOptions,
    ) -> Result<Self, ServiceError> {
        let info = driver.camera_info().await?;
        let profile = SensorProfile::detect(&info);
        info!("Camera info: {}", info);
        info!("Detected {}", profile.display_name());

        let streaming = profile.streaming_config();
        let still = profile.still_config();
        debug!("Streaming config: {:?}", streaming);
        debug!("Still config: {:?}", still);

        driver.configure(&streaming).await?;
        driver.start().await?;
        info!("Camera streaming at {}", streaming);

        Ok(Self {
            profile,
            info,
            streaming,
            still,
            options,
            captures,
            device: Mutex::new(Device {
                driver,
                mode: DeviceMode::Streaming,
                last_issued: 0,
            }),
        })
    }

    pub fn profile(&self) -> SensorProfile {
        self.profile
    }

    /// Identification string reported by the driver at startup
    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn streaming_config(&self) -> &CaptureConfig {
        &self.streaming
    }

    pub fn still_config(&self) -> &CaptureConfig {
        &self.still
    }

    pub fn captures(&self) -> &CaptureStore {
        &self.captures
    }

    pub async fn mode(&self) -> DeviceMode {
        self.device.lock().await.mode
    }

    /// Capture one JPEG frame from the streaming configuration.
    ///
    /// Waits while a still capture is in progress; fails when the device is
    /// not streaming.
    pub async fn capture_frame(&self) -> Result<Vec<u8>, ServiceError> {
        let mut device = self.device.lock().await;
        if device.mode != DeviceMode::Streaming {
            return Err(ServiceError::DeviceError(format!(
                "Camera is not streaming (mode: {})",
                device.mode
            )));
        }
        device.driver.capture_jpeg().await
    }

    /// Take a full-resolution still and return to streaming.
    ///
    /// Streaming is restored whether or not the capture succeeded. If the
    /// restore fails the device is left faulted and the failure is reported
    /// in [`StillCapture::recovery`]; a capture that succeeded is then
    /// reported as failed too, since the live stream is gone. A stopped
    /// camera is never restarted.
    pub async fn capture_still(&self) -> StillCapture {
        let mut device = self.device.lock().await;
        if device.mode == DeviceMode::Stopped {
            warn!("Still capture requested after the camera was stopped");
            return StillCapture {
                result: Err(ServiceError::DeviceError("Camera is stopped".to_string())),
                recovery: Recovery::NotNeeded,
            };
        }

        let number = match self.captures.next_capture_number().await {
            Ok(next) => next.max(device.last_issued + 1),
            Err(e) => {
                error!("Failed to allocate capture number: {}", e);
                return StillCapture {
                    result: Err(e),
                    recovery: Recovery::NotNeeded,
                };
            }
        };
        device.last_issued = number;
        let filename = capture_filename(number);

        info!("Capturing still {}", filename);
        let captured = self.take_still(&mut device, number).await;
        if let Err(e) = &captured {
            error!("Still capture {} failed: {}", filename, e);
        }

        let recovery = match self.restore_streaming(&mut device).await {
            Ok(()) => Recovery::Restored,
            Err(e) => {
                error!("Failed to restore streaming after still capture: {}", e);
                Recovery::Failed(e)
            }
        };

        let result = match (captured, &recovery) {
            (Err(e), _) => Err(e),
            (Ok(()), Recovery::Failed(e)) => Err(ServiceError::DeviceError(format!(
                "Captured {} but failed to resume streaming: {}",
                filename, e
            ))),
            (Ok(()), _) => {
                info!("Saved {}", filename);
                Ok(filename)
            }
        };

        StillCapture { result, recovery }
    }

    async fn take_still(&self, device: &mut Device, number: u64) -> Result<(), ServiceError> {
        device.driver.stop().await?;
        device.mode = DeviceMode::Still;
        device.driver.configure(&self.still).await?;
        device.driver.start().await?;

        if self.profile.has_autofocus() && !self.options.af_settle.is_zero() {
            debug!("Waiting {:?} for autofocus", self.options.af_settle);
            tokio::time::sleep(self.options.af_settle).await;
        }

        device
            .driver
            .capture_file(&self.captures.capture_path(number))
            .await
    }

    async fn restore_streaming(&self, device: &mut Device) -> Result<(), ServiceError> {
        let result = async {
            device.driver.stop().await?;
            device.driver.configure(&self.streaming).await?;
            device.driver.start().await
        }
        .await;

        device.mode = match result {
            Ok(()) => DeviceMode::Streaming,
            Err(_) => DeviceMode::Faulted,
        };
        result
    }

    /// Stop the camera. Open frame streams end on their next read.
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        let mut device = self.device.lock().await;
        if device.mode == DeviceMode::Stopped {
            return Ok(());
        }
        info!("Stopping camera...");
        device.mode = DeviceMode::Stopped;
        if let Err(e) = device.driver.stop().await {
            warn!("Failed to stop camera: {}", e);
            return Err(e);
        }
        Ok(())
    }
}
