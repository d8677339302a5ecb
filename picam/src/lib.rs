//! picam
//!
//! Web service for a Raspberry Pi camera: live MJPEG preview, full-resolution
//! still capture and browsing of the captured images.

pub mod app;
pub mod camera;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod server;
pub mod storage;
pub mod utils;
