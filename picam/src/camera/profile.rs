//! Sensor profile detection and the capture configurations each profile uses.

use std::time::Duration;

use crate::camera::driver::{
    AfMetering, AfMode, AfRange, CaptureConfig, Controls, Rectangle, Resolution,
};

/// Sensor name reported by the Camera Module 3 (IMX708)
const V3_SENSOR_MARKER: &str = "imx708";

/// Streaming frame duration for the V3; 10 fps keeps continuous AF from hunting
const V3_FRAME_DURATION: Duration = Duration::from_micros(100_000);

/// Share of each frame dimension covered by the V3 autofocus window
const V3_AF_WINDOW_FRACTION: f64 = 0.1;

pub const V3_STREAM_RESOLUTION: Resolution = Resolution::new(1920, 1080);
pub const V3_STILL_RESOLUTION: Resolution = Resolution::new(4608, 2592);
pub const GENERIC_STREAM_RESOLUTION: Resolution = Resolution::new(640, 480);

/// Classification of the attached camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorProfile {
    /// Camera Module 3: 16:9 sensor with autofocus
    WideV3,
    /// HQ camera or anything else: 4:3, no autofocus tuning
    Generic,
}

impl SensorProfile {
    /// Classify a device identification string
    pub fn detect(camera_info: &str) -> Self {
        if camera_info.to_lowercase().contains(V3_SENSOR_MARKER) {
            SensorProfile::WideV3
        } else {
            SensorProfile::Generic
        }
    }

    pub fn is_v3(&self) -> bool {
        matches!(self, SensorProfile::WideV3)
    }

    /// Whether stills need to wait for autofocus to converge
    pub fn has_autofocus(&self) -> bool {
        self.is_v3()
    }

    /// Human-readable camera type
    pub fn display_name(&self) -> &'static str {
        match self {
            SensorProfile::WideV3 => "Pi Camera V3",
            SensorProfile::Generic => "HQ or other camera",
        }
    }

    /// Configuration used for the live preview stream
    pub fn streaming_config(&self) -> CaptureConfig {
        match self {
            SensorProfile::WideV3 => {
                CaptureConfig::video(V3_STREAM_RESOLUTION).with_controls(Controls {
                    af_mode: Some(AfMode::Continuous),
                    af_range: Some(AfRange::Normal),
                    af_metering: Some(AfMetering::Windows),
                    af_windows: vec![Rectangle::centered(
                        V3_STREAM_RESOLUTION,
                        V3_AF_WINDOW_FRACTION,
                    )],
                    frame_duration_limits: Some((V3_FRAME_DURATION, V3_FRAME_DURATION)),
                })
            }
            SensorProfile::Generic => CaptureConfig::video(GENERIC_STREAM_RESOLUTION),
        }
    }

    /// Configuration used for full-resolution stills
    pub fn still_config(&self) -> CaptureConfig {
        match self {
            SensorProfile::WideV3 => CaptureConfig::still(Some(V3_STILL_RESOLUTION))
                .with_controls(Controls {
                    af_mode: Some(AfMode::Auto),
                    ..Default::default()
                }),
            SensorProfile::Generic => CaptureConfig::still(None),
        }
    }
}
