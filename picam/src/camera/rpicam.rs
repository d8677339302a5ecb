//! Camera driver backed by the rpicam-apps command line tools.
//!
//! Streaming runs one long-lived `rpicam-vid --codec mjpeg` process whose
//! stdout is split into JPEG frames. Stills are taken with a one-shot
//! `rpicam-still` process, which can only open the camera once the video
//! process has been stopped.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::camera::driver::{
    AfMetering, AfMode, AfRange, CameraDriver, CaptureConfig, CaptureKind, PixelFormat,
};
use crate::camera::mjpeg::JpegSplitter;
use crate::errors::ServiceError;
use crate::filesys::file::File;

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Commands used to drive the camera
#[derive(Debug, Clone)]
pub struct RpicamOptions {
    pub list_command: String,
    pub video_command: String,
    pub still_command: String,
}

impl Default for RpicamOptions {
    fn default() -> Self {
        Self {
            list_command: "rpicam-hello".to_string(),
            video_command: "rpicam-vid".to_string(),
            still_command: "rpicam-still".to_string(),
        }
    }
}

struct VideoPipe {
    child: Child,
    stdout: ChildStdout,
    splitter: JpegSplitter,
}

/// rpicam-apps driver
pub struct RpicamDriver {
    options: RpicamOptions,
    config: Option<CaptureConfig>,
    started: bool,
    video: Option<VideoPipe>,
}

impl RpicamDriver {
    pub fn new(options: RpicamOptions) -> Self {
        Self {
            options,
            config: None,
            started: false,
            video: None,
        }
    }

    fn config(&self) -> Result<&CaptureConfig, ServiceError> {
        self.config
            .as_ref()
            .ok_or_else(|| ServiceError::DeviceError("Camera not configured".to_string()))
    }

    fn ensure_started(&self) -> Result<(), ServiceError> {
        if self.started {
            Ok(())
        } else {
            Err(ServiceError::DeviceError("Camera is not started".to_string()))
        }
    }

    async fn read_video_frame(&mut self) -> Result<Vec<u8>, ServiceError> {
        let pipe = self
            .video
            .as_mut()
            .ok_or_else(|| ServiceError::DeviceError("Video stream not running".to_string()))?;

        let mut chunk = vec![0u8; READ_CHUNK_BYTES];
        loop {
            if let Some(frame) = pipe.splitter.next_frame() {
                return Ok(frame);
            }
            let n = pipe.stdout.read(&mut chunk).await?;
            if n == 0 {
                return Err(ServiceError::DeviceError(format!(
                    "{} stream ended",
                    self.options.video_command
                )));
            }
            pipe.splitter.push(&chunk[..n]);
        }
    }

    async fn run_still(&self, output: &str) -> Result<Vec<u8>, ServiceError> {
        let args = still_args(self.config()?, output);
        debug!("Running {} {}", self.options.still_command, args.join(" "));

        let result = Command::new(&self.options.still_command)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                ServiceError::DeviceError(format!(
                    "Failed to run {}: {}",
                    self.options.still_command, e
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ServiceError::DeviceError(format!(
                "{} failed ({}): {}",
                self.options.still_command,
                result.status,
                stderr.trim()
            )));
        }
        Ok(result.stdout)
    }
}

#[async_trait]
impl CameraDriver for RpicamDriver {
    async fn camera_info(&mut self) -> Result<String, ServiceError> {
        let output = Command::new(&self.options.list_command)
            .arg("--list-cameras")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                ServiceError::DeviceError(format!(
                    "Failed to run {}: {}",
                    self.options.list_command, e
                ))
            })?;

        // rpicam-apps print the listing on stderr in some releases, stdout in others
        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let text = text.trim();

        if !output.status.success() || text.is_empty() || text.contains("No cameras available") {
            return Err(ServiceError::DeviceError("No cameras available".to_string()));
        }
        Ok(text.to_string())
    }

    async fn configure(&mut self, config: &CaptureConfig) -> Result<(), ServiceError> {
        if self.started {
            return Err(ServiceError::DeviceError(
                "Cannot configure camera while it is running".to_string(),
            ));
        }
        if config.kind == CaptureKind::Video && config.pixel_format != PixelFormat::Yuv420 {
            return Err(ServiceError::ValidationError(format!(
                "MJPEG streaming requires YUV420 input, got {:?}",
                config.pixel_format
            )));
        }
        self.config = Some(config.clone());
        Ok(())
    }

    async fn start(&mut self) -> Result<(), ServiceError> {
        if self.started {
            return Ok(());
        }
        let config = self.config()?;

        if config.kind == CaptureKind::Video {
            let args = video_args(config);
            info!("Starting {} {}", self.options.video_command, args.join(" "));

            let mut child = Command::new(&self.options.video_command)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| {
                    ServiceError::DeviceError(format!(
                        "Failed to start {}: {}",
                        self.options.video_command, e
                    ))
                })?;
            let stdout = child.stdout.take().ok_or_else(|| {
                ServiceError::DeviceError("Video process has no stdout".to_string())
            })?;

            self.video = Some(VideoPipe {
                child,
                stdout,
                splitter: JpegSplitter::default(),
            });
        }

        self.started = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ServiceError> {
        self.started = false;
        if let Some(mut pipe) = self.video.take() {
            if let Ok(Some(status)) = pipe.child.try_wait() {
                warn!("{} had already exited: {}", self.options.video_command, status);
                return Ok(());
            }
            debug!("Stopping {}", self.options.video_command);
            if let Err(e) = pipe.child.kill().await {
                warn!("Failed to kill {}: {}", self.options.video_command, e);
                return Err(ServiceError::DeviceError(format!(
                    "Failed to stop {}: {}",
                    self.options.video_command, e
                )));
            }
        }
        Ok(())
    }

    async fn capture_jpeg(&mut self) -> Result<Vec<u8>, ServiceError> {
        self.ensure_started()?;
        if self.video.is_some() {
            self.read_video_frame().await
        } else {
            self.run_still("-").await
        }
    }

    async fn capture_file(&mut self, path: &Path) -> Result<(), ServiceError> {
        self.ensure_started()?;
        if self.video.is_some() {
            let frame = self.read_video_frame().await?;
            return File::new(path).write_bytes(&frame).await;
        }

        let output = path.to_str().ok_or_else(|| {
            ServiceError::ValidationError(format!("Non UTF-8 capture path: {}", path.display()))
        })?;
        self.run_still(output).await?;
        Ok(())
    }
}

/// Arguments for the streaming `rpicam-vid` process
pub fn video_args(config: &CaptureConfig) -> Vec<String> {
    let mut args: Vec<String> = ["--nopreview", "--timeout", "0", "--codec", "mjpeg"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    push_common_args(&mut args, config);
    args.push("--output".to_string());
    args.push("-".to_string());
    args
}

/// Arguments for a one-shot `rpicam-still` capture written to `output`
/// (`-` for stdout)
pub fn still_args(config: &CaptureConfig, output: &str) -> Vec<String> {
    let mut args: Vec<String> = ["--nopreview", "--timeout", "1", "--encoding", "jpg"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    push_common_args(&mut args, config);
    if config.controls.af_mode == Some(AfMode::Auto) {
        args.push("--autofocus-on-capture".to_string());
    }
    args.push("--output".to_string());
    args.push(output.to_string());
    args
}

fn push_common_args(args: &mut Vec<String>, config: &CaptureConfig) {
    let controls = &config.controls;

    if let Some(resolution) = config.resolution {
        args.push("--width".to_string());
        args.push(resolution.width.to_string());
        args.push("--height".to_string());
        args.push(resolution.height.to_string());
    }

    if let Some(mode) = controls.af_mode {
        let mode = match mode {
            AfMode::Manual => "manual",
            AfMode::Auto => "auto",
            AfMode::Continuous => "continuous",
        };
        args.push("--autofocus-mode".to_string());
        args.push(mode.to_string());
    }

    if let Some(range) = controls.af_range {
        let range = match range {
            AfRange::Normal => "normal",
            AfRange::Macro => "macro",
            AfRange::Full => "full",
        };
        args.push("--autofocus-range".to_string());
        args.push(range.to_string());
    }

    // rpicam takes a single window in coordinates normalised to the frame
    if controls.af_metering == Some(AfMetering::Windows) {
        if let (Some(window), Some(frame)) = (controls.af_windows.first(), config.resolution) {
            let fw = f64::from(frame.width);
            let fh = f64::from(frame.height);
            args.push("--autofocus-window".to_string());
            args.push(format!(
                "{:.4},{:.4},{:.4},{:.4}",
                f64::from(window.x) / fw,
                f64::from(window.y) / fh,
                f64::from(window.width) / fw,
                f64::from(window.height) / fh
            ));
        }
    }

    if let Some((_, max)) = controls.frame_duration_limits {
        let micros = max.as_micros();
        if micros > 0 {
            args.push("--framerate".to_string());
            args.push(format!("{}", 1_000_000.0 / micros as f64));
        }
    }
}
