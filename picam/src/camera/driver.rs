//! Camera driver abstraction and capture configuration types.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::ServiceError;

/// Frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel format of the sensor output fed to the JPEG encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, the MJPEG encoder input
    Yuv420,
    /// Packed 24-bit RGB
    Rgb888,
}

/// Whether a configuration targets continuous video or a single still
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Video,
    Still,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfMode {
    Manual,
    /// Single-shot autofocus, triggered per capture
    Auto,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfRange {
    Normal,
    Macro,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfMetering {
    Auto,
    Windows,
}

/// Rectangle in sensor output pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    /// Centered rectangle covering `fraction` of each dimension of `frame`.
    /// Sizes and offsets are truncated to whole pixels.
    pub fn centered(frame: Resolution, fraction: f64) -> Self {
        let width = (f64::from(frame.width) * fraction) as u32;
        let height = (f64::from(frame.height) * fraction) as u32;
        Self {
            x: (frame.width - width) / 2,
            y: (frame.height - height) / 2,
            width,
            height,
        }
    }
}

/// Optional device controls applied together with a configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Controls {
    pub af_mode: Option<AfMode>,
    pub af_range: Option<AfRange>,
    pub af_metering: Option<AfMetering>,
    pub af_windows: Vec<Rectangle>,
    /// Minimum and maximum frame duration
    pub frame_duration_limits: Option<(Duration, Duration)>,
}

impl Controls {
    pub fn is_empty(&self) -> bool {
        *self == Controls::default()
    }
}

/// A named bundle of resolution, pixel format and controls
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub kind: CaptureKind,
    /// `None` leaves the size to the device (full sensor resolution for stills)
    pub resolution: Option<Resolution>,
    pub pixel_format: PixelFormat,
    pub controls: Controls,
}

impl CaptureConfig {
    pub fn video(resolution: Resolution) -> Self {
        Self {
            kind: CaptureKind::Video,
            resolution: Some(resolution),
            pixel_format: PixelFormat::Yuv420,
            controls: Controls::default(),
        }
    }

    pub fn still(resolution: Option<Resolution>) -> Self {
        Self {
            kind: CaptureKind::Still,
            resolution,
            pixel_format: PixelFormat::Yuv420,
            controls: Controls::default(),
        }
    }

    pub fn with_controls(mut self, controls: Controls) -> Self {
        self.controls = controls;
        self
    }
}

impl fmt::Display for CaptureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            CaptureKind::Video => "video",
            CaptureKind::Still => "still",
        };
        match self.resolution {
            Some(resolution) => write!(f, "{kind} {resolution}"),
            None => write!(f, "{kind} (device default size)"),
        }
    }
}

/// Abstraction over the camera hardware.
///
/// A driver owns exactly one device. Configurations may only be applied while
/// the device is stopped; captures only succeed while it is started.
#[async_trait]
pub trait CameraDriver: Send {
    /// Identification string of the attached camera(s)
    async fn camera_info(&mut self) -> Result<String, ServiceError>;

    /// Apply a configuration to the stopped device
    async fn configure(&mut self, config: &CaptureConfig) -> Result<(), ServiceError>;

    /// Start the device with the current configuration
    async fn start(&mut self) -> Result<(), ServiceError>;

    /// Stop the device. Stopping a stopped device is a no-op.
    async fn stop(&mut self) -> Result<(), ServiceError>;

    /// Capture one JPEG-encoded frame into memory
    async fn capture_jpeg(&mut self) -> Result<Vec<u8>, ServiceError>;

    /// Capture one JPEG-encoded frame straight to `path`
    async fn capture_file(&mut self, path: &Path) -> Result<(), ServiceError>;
}
