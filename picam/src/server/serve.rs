//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::ServiceError;
use crate::server::handlers::{
    camera_info_handler, capture_file_handler, capture_handler, health_handler,
    index_handler, latest_capture_handler, version_handler, video_feed_handler,
};
use crate::server::state::ServerState;

/// Build the application router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Page and live stream
        .route("/", get(index_handler))
        .route("/video_feed", get(video_feed_handler))
        // Captures
        .route("/capture", get(capture_handler))
        .route("/latest_capture", get(latest_capture_handler))
        .route("/captures/{*filename}", get(capture_file_handler))
        // Metadata
        .route("/camera_info", get(camera_info_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // State and middleware
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), ServiceError>>, ServiceError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ServiceError::ServerError(format!("Failed to bind {}: {}", addr, e)))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServiceError::ServerError(e.to_string()))
    });

    Ok(handle)
}
