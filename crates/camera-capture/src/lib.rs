//! Frame Capture Library
//!
//! Supplies decoded RGB frames to the monitoring loop, one at a time and in
//! arrival order. Sources:
//! - Local camera device (`camera` feature)
//! - Image sequence directory (recorded footage exported as stills)
//! - In-memory frames (tests and demos)

#[cfg(feature = "camera")]
pub mod device;
pub mod frame;
pub mod source;

#[cfg(feature = "camera")]
pub use device::CameraSource;
pub use frame::VideoFrame;
pub use source::{open_source, FrameSource, ImageSequenceSource, MemorySource};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open source: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Streaming error: {0}")]
    Stream(String),
}

/// Kind of frame source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Directory of still frames
    #[default]
    Images,
    /// Local camera device
    Device,
}

/// Frame source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub kind: SourceKind,
    /// Directory of still frames (`images`)
    pub source: PathBuf,
    /// Camera index (`device`)
    pub device: i32,
    /// Frame rate used to timestamp image frames; requested from devices
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Images,
            source: PathBuf::from("frames"),
            device: 0,
            fps: 15,
        }
    }
}
