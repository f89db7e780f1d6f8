//! Tracker state and per-frame output

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Alarm status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Eyes open
    #[default]
    Safe,
    /// Eyes closed, alarm duration not yet reached
    Warning,
    /// Eyes closed for at least the alarm duration
    Alarm,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Safe => "SAFE",
            Status::Warning => "WARNING",
            Status::Alarm => "ALARM",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one tracker update
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackerOutput {
    pub status: Status,

    /// Time since the current closure run started (0 when eyes are open)
    pub elapsed_seconds: f64,

    pub alarm_active: bool,
}

/// Closure-run state, owned by one tracker for one session
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TrackerState {
    /// Timestamp of the first frame of the current closure run
    pub closure_start: Option<Duration>,
}

impl TrackerState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&Status::Alarm).unwrap(), "\"ALARM\"");
        assert_eq!(
            serde_json::from_str::<Status>("\"WARNING\"").unwrap(),
            Status::Warning
        );
        assert_eq!(Status::Safe.to_string(), "SAFE");
    }

    #[test]
    fn test_default_output_is_safe() {
        let output = TrackerOutput::default();
        assert_eq!(output.status, Status::Safe);
        assert_eq!(output.elapsed_seconds, 0.0);
        assert!(!output.alarm_active);
    }
}
