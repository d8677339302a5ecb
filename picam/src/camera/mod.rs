//! Camera device access: drivers, sensor profiles and the camera service

pub mod driver;
pub mod mjpeg;
pub mod profile;
pub mod rpicam;
pub mod service;
pub mod simulated;
