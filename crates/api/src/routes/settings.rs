//! Settings Routes

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dms::TrackerConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::AppState;

/// Partial settings update; omitted fields keep their current value
#[derive(Debug, Default, Deserialize)]
pub struct SettingsUpdate {
    pub confidence_threshold: Option<f32>,
    pub alarm_duration_seconds: Option<f64>,
    pub closed_markers: Option<Vec<String>>,
}

impl SettingsUpdate {
    fn apply(self, current: &TrackerConfig) -> TrackerConfig {
        TrackerConfig {
            confidence_threshold: self
                .confidence_threshold
                .unwrap_or(current.confidence_threshold),
            alarm_duration_seconds: self
                .alarm_duration_seconds
                .unwrap_or(current.alarm_duration_seconds),
            closed_markers: self
                .closed_markers
                .unwrap_or_else(|| current.closed_markers.clone()),
        }
    }
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Get current tracker settings
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<TrackerConfig> {
    Json(state.settings.snapshot().as_ref().clone())
}

/// Update tracker settings (admin only)
pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<SettingsUpdate>,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "settings are read-only: no admin token configured",
        );
    };

    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if provided != Some(expected) {
        warn!("Rejected settings update: bad or missing admin token");
        return error_response(StatusCode::UNAUTHORIZED, "admin token required");
    }

    let updated = update.apply(&state.settings.snapshot());
    match state.settings.replace(updated.clone()) {
        Ok(()) => {
            info!("Settings changed via API");
            (StatusCode::OK, Json(updated)).into_response()
        }
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    }
}
