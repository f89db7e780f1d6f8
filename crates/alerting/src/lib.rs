//! Alerting System
//!
//! Surfaces tracker output: frame overlays, alarm gating with repeat
//! cooldown, log and terminal-bell notifiers.

mod manager;
mod notifier;
mod overlay;

pub use manager::{AlarmGate, GateDecision};
pub use notifier::{BellNotifier, LogNotifier};
pub use overlay::OverlayRenderer;

use camera_capture::VideoFrame;
use dms::{Detection, TrackerOutput};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Alerting errors
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid frame: {0}")]
    Frame(String),
    #[error("Invalid font: {0}")]
    Font(String),
}

/// Draws tracker output for display
pub trait Renderer: Send {
    fn render(
        &mut self,
        frame: &VideoFrame,
        detections: &[Detection],
        output: &TrackerOutput,
    ) -> Result<(), AlertError>;
}

/// Raises alarms from tracker output
pub trait Notifier: Send {
    fn notify(&mut self, output: &TrackerOutput) -> Result<(), AlertError>;
}

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Interval between repeated alarm notifications while the alarm persists (seconds)
    pub repeat_seconds: f64,
    /// Ring the terminal bell on alarms
    pub bell: bool,
    /// Write annotated frames here
    pub overlay_dir: Option<PathBuf>,
    /// TrueType/OpenType font for overlay captions; captions are skipped without one
    pub font_path: Option<PathBuf>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            repeat_seconds: 5.0,
            bell: false,
            overlay_dir: None,
            font_path: None,
        }
    }
}
