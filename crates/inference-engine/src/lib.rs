//! Eye-State Detection
//!
//! Runs an object-detection model over each frame and reports labelled
//! boxes with confidences. Backends:
//! - YOLOv8 ONNX model via ONNX Runtime
//! - Scripted replay of recorded detections

mod names;
mod scripted;
mod yolo;

pub use names::ClassNames;
pub use scripted::ScriptedDetector;
pub use yolo::YoloDetector;

use camera_capture::VideoFrame;
use dms::Detection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors during detection
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid output shape: expected {expected}, got {actual}")]
    InvalidOutputShape { expected: String, actual: String },
    #[error("Invalid class names: {0}")]
    InvalidClassNames(String),
    #[error("Script read failed: {0}")]
    Script(#[from] std::io::Error),
}

/// Produces labelled detections for a frame
pub trait Detector: Send {
    /// Detect objects, keeping only boxes with confidence >= `confidence_threshold`
    fn detect(
        &mut self,
        frame: &VideoFrame,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, InferenceError>;
}

/// Detector backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Yolo,
    Scripted,
}

/// Detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub kind: DetectorKind,
    /// ONNX model exported from the trained detector
    pub model_path: PathBuf,
    /// JSON-lines detections for the scripted backend
    pub script_path: PathBuf,
    /// Overrides the class names stored in the model metadata
    pub class_names: Option<Vec<String>>,
    /// IoU above which overlapping boxes of one class are merged
    pub iou_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            kind: DetectorKind::Yolo,
            model_path: PathBuf::from("models/best.onnx"),
            script_path: PathBuf::from("detections.jsonl"),
            class_names: None,
            iou_threshold: 0.7,
        }
    }
}

/// Build the configured detector
pub fn build_detector(config: &DetectorConfig) -> Result<Box<dyn Detector>, InferenceError> {
    match config.kind {
        DetectorKind::Yolo => Ok(Box::new(YoloDetector::load(config)?)),
        DetectorKind::Scripted => Ok(Box::new(ScriptedDetector::open(&config.script_path)?)),
    }
}
