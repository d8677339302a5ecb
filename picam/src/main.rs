//! picam - Entry Point
//!
//! Serves a Raspberry Pi camera over HTTP.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use picam::app::options::{AppOptions, DriverOptions, ServerOptions};
use picam::app::run::run;
use picam::camera::rpicam::RpicamOptions;
use picam::camera::service::CameraOptions;
use picam::filesys::file::File;
use picam::logs::{init_logging, LogLevel, LogOptions};
use picam::storage::settings::{DriverKind, Settings};
use picam::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to render version: {}", e),
        }
        return;
    }

    // Settings file is optional; flags override it
    let mut settings = match cli_args.get("config") {
        Some(path) => match File::new(path).read_json::<Settings>().await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to read settings file {}: {}", path, e);
                std::process::exit(2);
            }
        },
        None => Settings::default(),
    };
    if let Err(e) = apply_cli_overrides(&mut settings, &cli_args) {
        eprintln!("{}", e);
        std::process::exit(2);
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log_json,
        log_dir: settings.log_dir.as_ref().map(PathBuf::from),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = app_options(&settings);
    info!("Running camera service with options: {:?}", options);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Camera service failed: {e}");
        std::process::exit(1);
    }
}

fn apply_cli_overrides(
    settings: &mut Settings,
    cli_args: &HashMap<String, String>,
) -> Result<(), String> {
    if let Some(host) = cli_args.get("host") {
        settings.server.host = host.clone();
    }
    if let Some(port) = cli_args.get("port") {
        settings.server.port = port
            .parse()
            .map_err(|_| format!("Invalid port: {}", port))?;
    }
    if let Some(dir) = cli_args.get("capture-dir") {
        settings.capture_dir = dir.clone();
    }
    if let Some(level) = cli_args.get("log-level") {
        settings.log_level = level.parse::<LogLevel>()?;
    }
    if cli_args.contains_key("simulate") {
        settings.camera.driver = DriverKind::Simulated;
    }
    Ok(())
}

fn app_options(settings: &Settings) -> AppOptions {
    let camera = &settings.camera;
    let driver = match camera.driver {
        DriverKind::Rpicam => DriverOptions::Rpicam(RpicamOptions {
            list_command: camera.list_command.clone(),
            video_command: camera.video_command.clone(),
            still_command: camera.still_command.clone(),
        }),
        DriverKind::Simulated => DriverOptions::Simulated {
            info: camera.simulated_info.clone(),
        },
    };

    AppOptions {
        server: ServerOptions {
            host: settings.server.host.clone(),
            port: settings.server.port,
        },
        capture_dir: PathBuf::from(&settings.capture_dir),
        driver,
        camera: CameraOptions {
            af_settle: Duration::from_millis(camera.af_settle_ms),
        },
        ..Default::default()
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
