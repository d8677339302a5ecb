//! Camera service tests against the simulated camera

use std::sync::Arc;
use std::time::Duration;

use picam::camera::driver::{CaptureKind, Resolution};
use picam::camera::profile::SensorProfile;
use picam::camera::service::{CameraOptions, CameraService, DeviceMode, Recovery};
use picam::camera::simulated::{DriverCall, SimulatedDriver};
use picam::filesys::dir::Dir;
use picam::storage::captures::CaptureStore;

const V3_INFO: &str = "0 : imx708 [4608x2592 10-bit RGGB] (/base/soc/i2c0mux/i2c@1/imx708@1a)";
const HQ_INFO: &str = "0 : imx477 [4056x3040 12-bit RGGB] (/base/soc/i2c0mux/i2c@1/imx477@1a)";

fn fast_options() -> CameraOptions {
    CameraOptions {
        af_settle: Duration::ZERO,
    }
}

async fn open(camera: &SimulatedDriver) -> CameraService {
    let dir = Dir::create_temp_dir("picam-service").await.unwrap();
    CameraService::open(Box::new(camera.clone()), CaptureStore::new(dir), fast_options())
        .await
        .unwrap()
}

fn active_resolution(camera: &SimulatedDriver) -> Option<Resolution> {
    camera.active_config().and_then(|c| c.resolution)
}

#[tokio::test]
async fn test_open_v3_starts_streaming() {
    let camera = SimulatedDriver::new(V3_INFO);
    let service = open(&camera).await;

    assert_eq!(service.profile(), SensorProfile::WideV3);
    assert_eq!(service.info(), V3_INFO);
    assert_eq!(service.mode().await, DeviceMode::Streaming);
    assert!(camera.is_started());
    assert_eq!(active_resolution(&camera), Some(Resolution::new(1920, 1080)));
    assert_eq!(
        service.still_config().resolution,
        Some(Resolution::new(4608, 2592))
    );
    service.captures().dir().delete().await.unwrap();
}

#[tokio::test]
async fn test_open_generic_streams_at_vga() {
    let camera = SimulatedDriver::new(HQ_INFO);
    let service = open(&camera).await;

    assert_eq!(service.profile(), SensorProfile::Generic);
    assert_eq!(active_resolution(&camera), Some(Resolution::new(640, 480)));
    assert_eq!(service.still_config().resolution, None);
    service.captures().dir().delete().await.unwrap();
}

#[tokio::test]
async fn test_still_capture_returns_to_streaming() {
    let camera = SimulatedDriver::new(V3_INFO);
    let service = open(&camera).await;

    let still = service.capture_still().await;
    assert_eq!(still.result.unwrap(), "capture_1.jpg");
    assert!(matches!(still.recovery, Recovery::Restored));
    assert!(service
        .captures()
        .dir()
        .file("capture_1.jpg")
        .is_file()
        .await);

    assert_eq!(service.mode().await, DeviceMode::Streaming);
    assert_eq!(active_resolution(&camera), Some(Resolution::new(1920, 1080)));
    let frame = service.capture_frame().await.unwrap();
    assert!(String::from_utf8_lossy(&frame).contains("1920x1080"));

    let path = service.captures().capture_path(1);
    let calls = camera.calls();
    assert_eq!(
        calls[calls.len() - 8..].to_vec(),
        vec![
            DriverCall::Stop,
            DriverCall::Configure(CaptureKind::Still),
            DriverCall::Start,
            DriverCall::CaptureFile(path),
            DriverCall::Stop,
            DriverCall::Configure(CaptureKind::Video),
            DriverCall::Start,
            DriverCall::CaptureJpeg,
        ]
    );
    service.captures().dir().delete().await.unwrap();
}

#[tokio::test]
async fn test_failed_still_still_restores_streaming() {
    let camera = SimulatedDriver::new(V3_INFO);
    let service = open(&camera).await;
    camera.fail_next_captures(1);

    let still = service.capture_still().await;
    assert!(still.result.is_err());
    assert!(matches!(still.recovery, Recovery::Restored));
    assert_eq!(service.mode().await, DeviceMode::Streaming);
    assert_eq!(active_resolution(&camera), Some(Resolution::new(1920, 1080)));
    assert!(service.capture_frame().await.is_ok());

    // the failed number is not reused
    let still = service.capture_still().await;
    assert_eq!(still.result.unwrap(), "capture_2.jpg");
    service.captures().dir().delete().await.unwrap();
}

#[tokio::test]
async fn test_failed_restore_faults_until_next_still() {
    let camera = SimulatedDriver::new(HQ_INFO);
    let service = open(&camera).await;
    // still start and restore start both fail
    camera.fail_next_starts(2);

    let still = service.capture_still().await;
    assert!(still.result.is_err());
    assert!(matches!(still.recovery, Recovery::Failed(_)));
    assert_eq!(service.mode().await, DeviceMode::Faulted);
    assert!(service.capture_frame().await.is_err());

    let still = service.capture_still().await;
    assert!(still.result.is_ok());
    assert_eq!(service.mode().await, DeviceMode::Streaming);
    assert!(service.capture_frame().await.is_ok());
    service.captures().dir().delete().await.unwrap();
}

#[tokio::test]
async fn test_numbers_continue_from_existing_files() {
    let camera = SimulatedDriver::new(HQ_INFO);
    let dir = Dir::create_temp_dir("picam-service").await.unwrap();
    dir.file("capture_3.jpg").write_bytes(b"old").await.unwrap();
    dir.file("capture_7.jpg").write_bytes(b"old").await.unwrap();
    let service = CameraService::open(
        Box::new(camera.clone()),
        CaptureStore::new(dir),
        fast_options(),
    )
    .await
    .unwrap();

    let still = service.capture_still().await;
    assert_eq!(still.result.unwrap(), "capture_8.jpg");
    service.captures().dir().delete().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_stills_get_distinct_numbers() {
    let camera = SimulatedDriver::new(V3_INFO).with_capture_delay(Duration::from_millis(10));
    let service = open(&camera).await;

    let (a, b, c) = tokio::join!(
        service.capture_still(),
        service.capture_still(),
        service.capture_still()
    );
    let mut names = vec![a.result.unwrap(), b.result.unwrap(), c.result.unwrap()];
    names.sort();
    assert_eq!(names, vec!["capture_1.jpg", "capture_2.jpg", "capture_3.jpg"]);
    service.captures().dir().delete().await.unwrap();
}

#[tokio::test]
async fn test_frames_pause_during_still_capture() {
    let camera = SimulatedDriver::new(V3_INFO).with_capture_delay(Duration::from_millis(5));
    let service = Arc::new(open(&camera).await);

    let reader = {
        let service = service.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                let frame = service.capture_frame().await.unwrap();
                assert!(String::from_utf8_lossy(&frame).contains("1920x1080"));
            }
        })
    };
    let still = service.capture_still().await;
    assert!(still.result.is_ok());
    reader.await.unwrap();
    service.captures().dir().delete().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_streaming() {
    let camera = SimulatedDriver::new(V3_INFO);
    let service = open(&camera).await;

    service.shutdown().await.unwrap();
    assert_eq!(service.mode().await, DeviceMode::Stopped);
    assert!(!camera.is_started());
    assert!(service.capture_frame().await.is_err());
    service.captures().dir().delete().await.unwrap();
}

#[tokio::test]
async fn test_still_after_shutdown_leaves_camera_stopped() {
    let camera = SimulatedDriver::new(V3_INFO);
    let service = open(&camera).await;
    service.shutdown().await.unwrap();
    let calls_before = camera.calls().len();

    let still = service.capture_still().await;
    assert!(still.result.is_err());
    assert!(matches!(still.recovery, Recovery::NotNeeded));
    assert_eq!(service.mode().await, DeviceMode::Stopped);
    assert!(!camera.is_started());
    assert_eq!(camera.calls().len(), calls_before);
    assert!(!service
        .captures()
        .dir()
        .file("capture_1.jpg")
        .is_file()
        .await);
    service.captures().dir().delete().await.unwrap();
}

#[tokio::test]
async fn test_saved_still_with_failed_restore_is_an_error() {
    let camera = SimulatedDriver::new(V3_INFO);
    let service = open(&camera).await;
    camera.fail_next_configures(CaptureKind::Video, 1);

    let still = service.capture_still().await;
    assert!(still.result.unwrap_err().to_string().contains("capture_1.jpg"));
    assert!(matches!(still.recovery, Recovery::Failed(_)));
    assert_eq!(service.mode().await, DeviceMode::Faulted);
    assert!(service
        .captures()
        .dir()
        .file("capture_1.jpg")
        .is_file()
        .await);
    assert!(service.capture_frame().await.is_err());

    let still = service.capture_still().await;
    assert_eq!(still.result.unwrap(), "capture_2.jpg");
    assert_eq!(service.mode().await, DeviceMode::Streaming);
    service.captures().dir().delete().await.unwrap();
}
