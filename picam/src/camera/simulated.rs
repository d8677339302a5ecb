//! In-process simulated camera for running without hardware and for tests.
//!
//! Frames are SOI/EOI-delimited buffers that carry the sequence number and
//! the active resolution as text; they are not decodable images.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::camera::driver::{CameraDriver, CaptureConfig, CaptureKind};
use crate::errors::ServiceError;
use crate::filesys::file::File;

/// Driver calls recorded by the simulated camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    CameraInfo,
    Configure(CaptureKind),
    Start,
    Stop,
    CaptureJpeg,
    CaptureFile(PathBuf),
}

#[derive(Debug)]
struct SimState {
    info: String,
    config: Option<CaptureConfig>,
    started: bool,
    frame_count: u64,
    calls: Vec<DriverCall>,
    failing_captures: usize,
    failing_starts: usize,
    failing_configures: Option<(CaptureKind, usize)>,
    capture_delay: Duration,
}

/// Simulated camera. Clones share the same device, so a test can keep a
/// handle while the service owns the driver.
#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedDriver {
    /// Create a camera reporting `info` as its identification string
    pub fn new(info: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                info: info.into(),
                config: None,
                started: false,
                frame_count: 0,
                calls: Vec::new(),
                failing_captures: 0,
                failing_starts: 0,
                failing_configures: None,
                capture_delay: Duration::ZERO,
            })),
        }
    }

    /// Delay every capture by `delay`
    pub fn with_capture_delay(self, delay: Duration) -> Self {
        self.state().capture_delay = delay;
        self
    }

    /// Make the next `count` file captures fail
    pub fn fail_next_captures(&self, count: usize) {
        self.state().failing_captures = count;
    }

    /// Make the next `count` starts fail
    pub fn fail_next_starts(&self, count: usize) {
        self.state().failing_starts = count;
    }

    /// Make the next `count` configurations of `kind` fail
    pub fn fail_next_configures(&self, kind: CaptureKind, count: usize) {
        self.state().failing_configures = Some((kind, count));
    }

    /// Configuration currently applied to the device
    pub fn active_config(&self) -> Option<CaptureConfig> {
        self.state().config.clone()
    }

    pub fn is_started(&self) -> bool {
        self.state().started
    }

    /// Every driver call made so far, in order
    pub fn calls(&self) -> Vec<DriverCall> {
        self.state().calls.clone()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Produce the next frame, or fail if the device is not running.
    /// Returns the configured capture delay alongside so the caller can sleep
    /// without holding the lock.
    fn next_frame(&self, call: DriverCall) -> Result<(Vec<u8>, Duration), ServiceError> {
        let mut state = self.state();
        state.calls.push(call.clone());

        if !state.started {
            return Err(ServiceError::DeviceError("Camera is not started".to_string()));
        }
        if matches!(call, DriverCall::CaptureFile(_)) && state.failing_captures > 0 {
            state.failing_captures -= 1;
            return Err(ServiceError::DeviceError("Simulated capture failure".to_string()));
        }

        let size = state
            .config
            .as_ref()
            .and_then(|c| c.resolution)
            .map(|r| r.to_string())
            .unwrap_or_else(|| "default".to_string());
        let mut frame = vec![0xFF, 0xD8];
        frame.extend_from_slice(format!("SIM {} {}", state.frame_count, size).as_bytes());
        frame.extend_from_slice(&[0xFF, 0xD9]);
        state.frame_count += 1;

        Ok((frame, state.capture_delay))
    }
}

#[async_trait]
impl CameraDriver for SimulatedDriver {
    async fn camera_info(&mut self) -> Result<String, ServiceError> {
        let mut state = self.state();
        state.calls.push(DriverCall::CameraInfo);
        Ok(state.info.clone())
    }

    async fn configure(&mut self, config: &CaptureConfig) -> Result<(), ServiceError> {
        let mut state = self.state();
        state.calls.push(DriverCall::Configure(config.kind));
        if state.started {
            return Err(ServiceError::DeviceError(
                "Cannot configure camera while it is running".to_string(),
            ));
        }
        if let Some((kind, count)) = state.failing_configures {
            if kind == config.kind && count > 0 {
                state.failing_configures = Some((kind, count - 1));
                return Err(ServiceError::DeviceError(
                    "Simulated configure failure".to_string(),
                ));
            }
        }
        state.config = Some(config.clone());
        Ok(())
    }

    async fn start(&mut self) -> Result<(), ServiceError> {
        let mut state = self.state();
        state.calls.push(DriverCall::Start);
        if state.failing_starts > 0 {
            state.failing_starts -= 1;
            return Err(ServiceError::DeviceError("Simulated start failure".to_string()));
        }
        if state.config.is_none() {
            return Err(ServiceError::DeviceError("Camera not configured".to_string()));
        }
        state.started = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ServiceError> {
        let mut state = self.state();
        state.calls.push(DriverCall::Stop);
        state.started = false;
        Ok(())
    }

    async fn capture_jpeg(&mut self) -> Result<Vec<u8>, ServiceError> {
        let (frame, delay) = self.next_frame(DriverCall::CaptureJpeg)?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(frame)
    }

    async fn capture_file(&mut self, path: &Path) -> Result<(), ServiceError> {
        let (frame, delay) = self.next_frame(DriverCall::CaptureFile(path.to_path_buf()))?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        File::new(path).write_bytes(&frame).await
    }
}
