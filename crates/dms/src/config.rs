//! Tracker configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum detection confidence, in (0, 1]
    pub confidence_threshold: f32,

    /// Continuous eye closure before the alarm fires (seconds)
    pub alarm_duration_seconds: f64,

    /// Label fragments that mark a "closed eye" class, matched case-insensitively.
    /// Label vocabularies differ between trained models, so this is data.
    pub closed_markers: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            alarm_duration_seconds: 2.0,
            closed_markers: vec!["tutup".into(), "closed".into(), "close".into()],
        }
    }
}

impl TrackerConfig {
    /// Check value ranges. Rejects NaN for both numeric fields.
    pub fn validate(&self) -> Result<(), DmsError> {
        let threshold = self.confidence_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(DmsError::InvalidConfiguration(format!(
                "confidence_threshold {} is outside (0, 1]",
                threshold
            )));
        }

        let duration = self.alarm_duration_seconds;
        if !(duration.is_finite() && duration > 0.0) {
            return Err(DmsError::InvalidConfiguration(format!(
                "alarm_duration_seconds {} must be a finite value > 0",
                duration
            )));
        }

        if self.closed_markers.iter().all(|m| m.trim().is_empty()) {
            return Err(DmsError::InvalidConfiguration(
                "closed_markers must contain at least one non-blank marker".into(),
            ));
        }

        Ok(())
    }

    /// Alarm duration as a `Duration`, saturating for values too large to hold
    pub fn alarm_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.alarm_duration_seconds).unwrap_or(Duration::MAX)
    }

    /// Whether `label` contains any closed-eye marker (case-insensitive)
    pub fn is_closed_label(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.closed_markers
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .any(|m| label.contains(&m.to_lowercase()))
    }
}
