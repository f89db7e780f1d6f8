//! Driver Monitoring System (DMS)
//!
//! Microsleep detection from per-frame eye-state detections:
//! - Closed-eye label interpretation against configurable marker substrings
//! - Eye-closure timer with SAFE / WARNING / ALARM states
//! - Settings shared between a running session and a control surface

pub mod config;
pub mod detection;
pub mod settings;
pub mod state;
pub mod tracker;

pub use config::TrackerConfig;
pub use detection::{interpret, BoundingBox, Detection, FrameEyes};
pub use settings::SharedSettings;
pub use state::{Status, TrackerOutput};
pub use tracker::DrowsinessTracker;

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DmsError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Malformed detection input: {0}")]
    MalformedDetectionInput(String),
}
