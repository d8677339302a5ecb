//! HTTP routing tests driven through the router with the simulated camera

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use serde_json::Value;
use tower::ServiceExt;

use picam::camera::driver::{CaptureKind, Resolution};
use picam::camera::service::{CameraOptions, CameraService};
use picam::camera::simulated::SimulatedDriver;
use picam::filesys::dir::Dir;
use picam::server::serve::router;
use picam::server::state::ServerState;
use picam::storage::captures::CaptureStore;

struct TestApp {
    router: Router,
    camera: SimulatedDriver,
    service: Arc<CameraService>,
}

impl TestApp {
    async fn new(info: &str) -> Self {
        let camera = SimulatedDriver::new(info);
        let dir = Dir::create_temp_dir("picam-routes").await.unwrap();
        let service = CameraService::open(
            Box::new(camera.clone()),
            CaptureStore::new(dir),
            CameraOptions {
                af_settle: Duration::ZERO,
            },
        )
        .await
        .unwrap();
        let service = Arc::new(service);
        let router = router(Arc::new(ServerState::new(service.clone())));
        Self {
            router,
            camera,
            service,
        }
    }

    fn dir(&self) -> &Dir {
        self.service.captures().dir()
    }

    async fn get(&self, uri: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let response = self.get(uri).await;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn cleanup(self) {
        self.dir().delete().await.unwrap();
    }
}

#[tokio::test]
async fn test_index_page_reflects_profile() {
    let app = TestApp::new("imx708").await;
    let response = app.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let page = String::from_utf8(body.to_vec()).unwrap();
    assert!(page.contains("Pi Camera V3"));
    app.cleanup().await;
}

#[tokio::test]
async fn test_camera_info() {
    let app = TestApp::new("0 : imx477 [4056x3040]").await;
    let (status, body) = app.get_json("/camera_info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_v3"], false);
    assert_eq!(body["type"], "HQ or other camera");
    assert_eq!(body["info"], "0 : imx477 [4056x3040]");
    assert_eq!(body["mode"], "streaming");
    app.cleanup().await;
}

#[tokio::test]
async fn test_latest_capture() {
    let app = TestApp::new("imx708").await;

    let (status, body) = app.get_json("/latest_capture").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No captures found");

    app.dir().file("capture_1.jpg").write_bytes(b"one").await.unwrap();
    app.dir().file("capture_2.jpg").write_bytes(b"two").await.unwrap();
    let (status, body) = app.get_json("/latest_capture").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["filename"], "capture_2.jpg");
    app.cleanup().await;
}

#[tokio::test]
async fn test_capture_then_serve_file() {
    let app = TestApp::new("imx708").await;

    let (status, body) = app.get_json("/capture").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["filename"], "capture_1.jpg");

    let response = app.get("/captures/capture_1.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "image/jpeg"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    assert!(String::from_utf8_lossy(&bytes).contains("4608x2592"));
    app.cleanup().await;
}

#[tokio::test]
async fn test_failed_capture_returns_500_and_keeps_streaming() {
    let app = TestApp::new("imx708").await;
    app.camera.fail_next_captures(1);

    let (status, body) = app.get_json("/capture").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Simulated capture failure"));
    assert!(body.get("filename").is_none());

    let active = app.camera.active_config().unwrap();
    assert_eq!(active.resolution, Some(Resolution::new(1920, 1080)));
    let (_, info) = app.get_json("/camera_info").await;
    assert_eq!(info["mode"], "streaming");
    app.cleanup().await;
}

#[tokio::test]
async fn test_latest_capture_missing_dir_is_server_error() {
    let app = TestApp::new("imx708").await;
    app.dir().delete().await.unwrap();

    let (status, body) = app.get_json("/latest_capture").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_ne!(body["error"], "No captures found");
    app.cleanup().await;
}

#[tokio::test]
async fn test_saved_capture_with_failed_restore_returns_500() {
    let app = TestApp::new("imx708").await;
    app.camera.fail_next_configures(CaptureKind::Video, 1);

    let (status, body) = app.get_json("/capture").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(app.dir().file("capture_1.jpg").is_file().await);

    let (_, info) = app.get_json("/camera_info").await;
    assert_eq!(info["mode"], "faulted");
    app.cleanup().await;
}

#[tokio::test]
async fn test_faulted_camera_reports_mode_and_ends_video_feed() {
    let app = TestApp::new("imx708").await;
    // still start and restore start both fail
    app.camera.fail_next_starts(2);

    let (status, body) = app.get_json("/capture").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);

    let (status, info) = app.get_json("/camera_info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["mode"], "faulted");

    let response = app.get("/video_feed").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());

    // the next capture heals the device
    let (status, _) = app.get_json("/capture").await;
    assert_eq!(status, StatusCode::OK);
    let (_, info) = app.get_json("/camera_info").await;
    assert_eq!(info["mode"], "streaming");
    app.cleanup().await;
}

#[tokio::test]
async fn test_capture_after_shutdown_fails_and_stays_stopped() {
    let app = TestApp::new("imx708").await;
    app.service.shutdown().await.unwrap();

    let (status, body) = app.get_json("/capture").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(!app.camera.is_started());

    let (_, info) = app.get_json("/camera_info").await;
    assert_eq!(info["mode"], "stopped");
    app.cleanup().await;
}

#[tokio::test]
async fn test_capture_files_reject_traversal() {
    let app = TestApp::new("imx708").await;
    app.dir().file("capture_1.jpg").write_bytes(b"one").await.unwrap();

    for uri in [
        "/captures/../../etc/passwd",
        "/captures/..%2F..%2Fetc%2Fpasswd",
        "/captures/%2Fetc%2Fpasswd",
        "/captures/capture_9.jpg",
    ] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
    app.cleanup().await;
}

#[tokio::test]
async fn test_video_feed_streams_multipart_jpeg() {
    let app = TestApp::new("imx708").await;

    let response = app.get("/video_feed").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=frame"
    );

    let mut frames = response.into_body().into_data_stream();
    for _ in 0..3 {
        let segment = frames.next().await.unwrap().unwrap();
        assert!(segment.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8"));
        assert!(segment.ends_with(b"\xFF\xD9\r\n"));
    }
    drop(frames);
    app.cleanup().await;
}

#[tokio::test]
async fn test_video_feed_ends_when_camera_stops() {
    let app = TestApp::new("imx708").await;
    app.service.shutdown().await.unwrap();

    let response = app.get("/video_feed").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());
    app.cleanup().await;
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new("imx708").await;
    let (status, body) = app.get_json("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    app.cleanup().await;
}
