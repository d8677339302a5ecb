//! MJPEG streaming over `multipart/x-mixed-replace`.

use std::sync::Arc;

use axum::body::Bytes;
use futures::stream::{self, Stream};
use tracing::warn;

use crate::camera::service::CameraService;
use crate::errors::ServiceError;

/// Multipart boundary separating frames
pub const BOUNDARY: &str = "frame";

/// Content type of the frame stream
pub fn stream_content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={BOUNDARY}")
}

/// Wrap one JPEG as a multipart segment
pub fn multipart_segment(jpeg: &[u8]) -> Bytes {
    let header = format!("--{BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut segment = Vec::with_capacity(header.len() + jpeg.len() + 2);
    segment.extend_from_slice(header.as_bytes());
    segment.extend_from_slice(jpeg);
    segment.extend_from_slice(b"\r\n");
    Bytes::from(segment)
}

/// Endless stream of multipart segments read from the camera.
///
/// The stream ends after the first failed read instead of yielding the error,
/// so clients see a closed response rather than a reset connection. Dropping
/// the stream (client disconnect) stops frame production.
pub fn frame_stream(
    camera: Arc<CameraService>,
) -> impl Stream<Item = Result<Bytes, ServiceError>> + Send + 'static {
    stream::unfold(camera, |camera| async move {
        match camera.capture_frame().await {
            Ok(frame) => Some((Ok(multipart_segment(&frame)), camera)),
            Err(e) => {
                warn!("Ending video stream: {}", e);
                None
            }
        }
    })
}
