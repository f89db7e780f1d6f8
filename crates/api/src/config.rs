//! Application configuration

use std::path::Path;

use alerting::AlertConfig;
use camera_capture::CameraConfig;
use config::{Config, Environment, File};
use dms::TrackerConfig;
use inference_engine::DetectorConfig;
use serde::{Deserialize, Serialize};

use crate::AppError;

/// Environment variable prefix, e.g. `MICROSLEEP_TRACKER__ALARM_DURATION_SECONDS=3`
pub const ENV_PREFIX: &str = "MICROSLEEP";

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Bearer token allowed to change settings; settings are read-only without one
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            admin_token: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tracker: TrackerConfig,
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub alerting: AlertConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from an optional TOML file, then environment overrides.
    /// Tracker values are validated here so a bad file blocks startup.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: AppConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("tracker.closed_markers"),
            )
            .build()?
            .try_deserialize()?;

        config.tracker.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::SourceKind;
    use inference_engine::DetectorKind;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.tracker, TrackerConfig::default());
        assert_eq!(config.detector.kind, DetectorKind::Yolo);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        std::fs::write(
            &path,
            r#"
[tracker]
confidence_threshold = 0.4
alarm_duration_seconds = 3.0
closed_markers = ["drowsy"]

[camera]
kind = "device"
device = 1

[detector]
kind = "scripted"
script_path = "replay.jsonl"

[alerting]
bell = true
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.tracker.confidence_threshold, 0.4);
        assert_eq!(config.tracker.alarm_duration_seconds, 3.0);
        assert_eq!(config.tracker.closed_markers, vec!["drowsy".to_string()]);
        assert_eq!(config.detector.kind, DetectorKind::Scripted);
        assert!(config.alerting.bell);
        assert_eq!(config.camera.kind, SourceKind::Device);
        assert_eq!(config.camera.device, 1);
        assert_eq!(config.camera.fps, 15);
    }

    #[test]
    fn test_invalid_tracker_blocks_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[tracker]\nalarm_duration_seconds = 0.0\n").unwrap();

        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(AppError::Dms(dms::DmsError::InvalidConfiguration(_)))
        ));
    }

    #[test]
    fn test_shipped_sample_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/microsleep.toml");
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.tracker, TrackerConfig::default());
        assert!(config.alerting.bell);
        assert!(config.alerting.overlay_dir.is_none());
        assert_eq!(config.camera.kind, SourceKind::Images);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/monitor.toml"))).is_err());
    }

    #[test]
    fn test_environment_override() {
        std::env::set_var("MICROSLEEP_SERVER__ADMIN_TOKEN", "from-env");
        let config = AppConfig::load(None).unwrap();
        std::env::remove_var("MICROSLEEP_SERVER__ADMIN_TOKEN");

        assert_eq!(config.server.admin_token.as_deref(), Some("from-env"));
    }
}
