//! Microsleep Monitor
//!
//! Runs a monitoring session over a frame source and serves its status and
//! live-adjustable settings over HTTP.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::future::IntoFuture;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
mod routes;
pub mod session;

pub use crate::config::{AppConfig, LoggingConfig, ServerConfig};
pub use session::{MonitorSession, SessionState, SessionStatus, SessionSummary, StopHandle};

use alerting::{BellNotifier, LogNotifier, OverlayRenderer};
use camera_capture::open_source;
use dms::SharedSettings;

/// Application errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error(transparent)]
    Dms(#[from] dms::DmsError),
    #[error("Frame source error: {0}")]
    Camera(#[from] camera_capture::CameraError),
    #[error("Detector error: {0}")]
    Inference(#[from] inference_engine::InferenceError),
    #[error("Alerting error: {0}")]
    Alert(#[from] alerting::AlertError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Logging setup failed: {0}")]
    Logging(String),
    #[error("Metrics setup failed: {0}")]
    Metrics(String),
}

/// Application state shared across handlers
pub struct AppState {
    /// Live tracker settings
    pub settings: SharedSettings,
    /// Latest session status
    pub status: watch::Receiver<SessionStatus>,
    /// Token required to change settings
    pub admin_token: Option<String>,
    /// Prometheus exposition handle
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(
        settings: SharedSettings,
        status: watch::Receiver<SessionStatus>,
        admin_token: Option<String>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            settings,
            status,
            admin_token,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub session: SessionState,
    pub session_running: bool,
    pub frames_processed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_error: Option<String>,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/status", get(routes::status::get_status))
        .route(
            "/api/v1/settings",
            get(routes::settings::get_settings).put(routes::settings::put_settings),
        )
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler.
///
/// Unhealthy (503) once the session has failed; degraded once it has ended.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let (session, frames_processed, session_error) = {
        let status = state.status.borrow();
        (status.state, status.frames, status.error.clone())
    };

    let (code, health) = match session {
        SessionState::Failed => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
        SessionState::Finished => (StatusCode::OK, "degraded"),
        SessionState::Idle | SessionState::Running => (StatusCode::OK, "healthy"),
    };

    let body = HealthResponse {
        status: health.to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        session,
        session_running: session == SessionState::Running,
        frames_processed,
        session_error,
    };
    (code, Json(body))
}

/// Prometheus metrics handler
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> Result<(), AppError> {
    let level = Level::from_str(&config.level)
        .map_err(|_| AppError::Logging(format!("unknown level '{}'", config.level)))?;
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| AppError::Logging(e.to_string()))
}

/// Install the global Prometheus recorder
pub fn install_metrics() -> Result<PrometheusHandle, AppError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AppError::Metrics(e.to_string()))
}

/// Assemble a session from configuration
pub fn build_session(
    config: &AppConfig,
    settings: SharedSettings,
    status_tx: watch::Sender<SessionStatus>,
) -> Result<MonitorSession, AppError> {
    let source = open_source(&config.camera)?;
    let detector = inference_engine::build_detector(&config.detector)?;

    let repeat = config.alerting.repeat_seconds;
    let mut session = MonitorSession::new(source, detector, settings.clone(), status_tx)
        .with_notifier(Box::new(LogNotifier::new(repeat)));

    if config.alerting.bell {
        session = session.with_notifier(Box::new(BellNotifier::stdout(repeat)));
    }
    if let Some(dir) = &config.alerting.overlay_dir {
        let mut renderer = OverlayRenderer::new(settings, Some(dir.clone()))?;
        if let Some(font) = &config.alerting.font_path {
            renderer = renderer.with_font(font)?;
        }
        session = session.with_renderer(Box::new(renderer));
    }

    Ok(session)
}

/// Run the monitoring session and the API server until Ctrl-C
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let metrics = install_metrics()?;
    let settings = SharedSettings::new(config.tracker.clone())?;
    let (status_tx, status_rx) = watch::channel(SessionStatus::default());

    let session = build_session(&config, settings.clone(), status_tx)?;
    let stop = session.stop_handle();
    let mut worker = tokio::task::spawn_blocking(move || session.run());

    if config.server.admin_token.is_none() {
        info!("No admin token configured; settings are read-only");
    }
    let state = Arc::new(AppState::new(
        settings,
        status_rx,
        config.server.admin_token.clone(),
        Some(metrics),
    ));
    let app = create_router(state);

    info!("Starting API server on {}", config.server.bind);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    tokio::pin!(server);

    // The API keeps serving after the session ends so health reflects it
    let outcome = tokio::select! {
        served = &mut server => {
            stop.stop();
            served?;
            worker.await
        }
        outcome = &mut worker => {
            warn!("Monitoring session ended; API stays up until shutdown");
            server.await?;
            outcome
        }
    };

    match outcome {
        Ok(Ok(summary)) => info!(
            "Session summary: {} frames, {} alarms",
            summary.frames, summary.alarms
        ),
        // Already logged by the session when it failed
        Ok(Err(e)) => debug!("Session result: {}", e),
        Err(e) => error!("Session worker panicked: {}", e),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use camera_capture::{CameraError, FrameSource, MemorySource, SourceKind, VideoFrame};
    use dms::TrackerConfig;
    use inference_engine::{DetectorConfig, DetectorKind, ScriptedDetector};
    use tower::ServiceExt;

    struct UnpluggedCamera;

    impl FrameSource for UnpluggedCamera {
        fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
            Err(CameraError::Stream("device unplugged".into()))
        }
    }

    async fn health_after(source: Box<dyn FrameSource>) -> (StatusCode, serde_json::Value) {
        let settings = SharedSettings::new(TrackerConfig::default()).unwrap();
        let (tx, rx) = watch::channel(SessionStatus::default());
        let session = MonitorSession::new(
            source,
            Box::new(ScriptedDetector::default()),
            settings.clone(),
            tx,
        );
        let _ = session.run();

        let app = create_router(Arc::new(AppState::new(settings, rx, None, None)));
        let response = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let code = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (code, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_failed_session() {
        let (code, body) = health_after(Box::new(UnpluggedCamera)).await;

        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["session"], "failed");
        assert_eq!(body["session_running"], false);
        assert!(body["session_error"]
            .as_str()
            .unwrap()
            .contains("device unplugged"));
    }

    #[tokio::test]
    async fn test_health_reports_finished_session() {
        let (code, body) = health_after(Box::new(MemorySource::uniform(2, 4, 4, 5))).await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["session"], "finished");
        assert_eq!(body["frames_processed"], 2);
        assert!(body.get("session_error").is_none());
    }

    #[test]
    fn test_build_session_scripted_images() {
        let frames = tempfile::tempdir().unwrap();
        image::RgbImage::new(4, 4)
            .save(frames.path().join("0001.png"))
            .unwrap();
        let script = frames.path().join("replay.jsonl");
        std::fs::write(&script, r#"[{"label": "closed", "confidence": 0.9}]"#).unwrap();

        let mut config = AppConfig::default();
        config.camera.source = frames.path().to_path_buf();
        config.detector = DetectorConfig {
            kind: DetectorKind::Scripted,
            script_path: script,
            ..Default::default()
        };
        config.alerting.bell = false;

        let settings = SharedSettings::new(config.tracker.clone()).unwrap();
        let (tx, rx) = watch::channel(SessionStatus::default());
        let summary = build_session(&config, settings, tx).unwrap().run().unwrap();

        assert_eq!(summary.frames, 1);
        assert_eq!(rx.borrow().output.status, dms::Status::Warning);
    }

    #[cfg(not(feature = "camera"))]
    #[test]
    fn test_build_session_device_without_camera_support() {
        let mut config = AppConfig::default();
        config.camera.kind = SourceKind::Device;
        let settings = SharedSettings::new(config.tracker.clone()).unwrap();
        let (tx, _rx) = watch::channel(SessionStatus::default());

        assert!(matches!(
            build_session(&config, settings, tx),
            Err(AppError::Camera(CameraError::Open(_)))
        ));
    }
}
