//! Detector output and closed-eye interpretation

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DmsError, TrackerConfig};

/// Bounding box in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One detected box as reported by the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label; `None` when the class id could not be resolved
    #[serde(default)]
    pub label: Option<String>,

    /// Detection confidence (0-1)
    pub confidence: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: Some(label.into()),
            confidence,
            bbox: None,
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Label of a well-formed entry
    pub fn label(&self) -> Result<&str, DmsError> {
        if !self.confidence.is_finite() {
            return Err(DmsError::MalformedDetectionInput(format!(
                "non-finite confidence {}",
                self.confidence
            )));
        }

        match self.label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => Ok(label),
            _ => Err(DmsError::MalformedDetectionInput(
                "missing class label".into(),
            )),
        }
    }
}

/// Eye state derived from one frame's detections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEyes {
    pub eyes_closed: bool,

    /// Well-formed entries at or above the confidence threshold
    pub accepted: usize,

    /// Entries dropped as malformed
    pub skipped_malformed: usize,
}

/// Decide whether a frame shows closed eyes.
///
/// Malformed entries are skipped and counted. Entries below the confidence
/// threshold are not accepted; detectors normally filter these already.
pub fn interpret(detections: &[Detection], config: &TrackerConfig) -> FrameEyes {
    let mut eyes = FrameEyes::default();

    for detection in detections {
        let label = match detection.label() {
            Ok(label) => label,
            Err(e) => {
                debug!("Skipping detection: {}", e);
                eyes.skipped_malformed += 1;
                continue;
            }
        };

        if detection.confidence < config.confidence_threshold {
            continue;
        }

        eyes.accepted += 1;
        if config.is_closed_label(label) {
            eyes.eyes_closed = true;
        }
    }

    eyes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_label_detected() {
        let config = TrackerConfig::default();
        let eyes = interpret(
            &[Detection::new("mata_buka", 0.9), Detection::new("Mata_Tutup", 0.8)],
            &config,
        );
        assert!(eyes.eyes_closed);
        assert_eq!(eyes.accepted, 2);
    }

    #[test]
    fn test_no_detections_means_open() {
        let eyes = interpret(&[], &TrackerConfig::default());
        assert!(!eyes.eyes_closed);
        assert_eq!(eyes, FrameEyes::default());
    }

    #[test]
    fn test_malformed_entry_ignored() {
        let config = TrackerConfig::default();
        let malformed = Detection {
            label: None,
            confidence: 0.99,
            bbox: None,
        };
        let eyes = interpret(&[Detection::new("closed", 0.9), malformed], &config);

        assert!(eyes.eyes_closed);
        assert_eq!(eyes.accepted, 1);
        assert_eq!(eyes.skipped_malformed, 1);
    }

    #[test]
    fn test_malformed_only_is_open() {
        let config = TrackerConfig::default();
        let detections = [
            Detection::new("", 0.9),
            Detection::new("closed", f32::NAN),
        ];
        let eyes = interpret(&detections, &config);

        assert!(!eyes.eyes_closed);
        assert_eq!(eyes.skipped_malformed, 2);
    }

    #[test]
    fn test_below_threshold_not_accepted() {
        let config = TrackerConfig {
            confidence_threshold: 0.6,
            ..Default::default()
        };
        let eyes = interpret(&[Detection::new("closed", 0.4)], &config);
        assert!(!eyes.eyes_closed);
        assert_eq!(eyes.accepted, 0);

        // Boundary is inclusive
        let eyes = interpret(&[Detection::new("closed", 0.6)], &config);
        assert!(eyes.eyes_closed);
    }

    #[test]
    fn test_custom_markers() {
        let config = TrackerConfig {
            closed_markers: vec!["drowsy".into()],
            ..Default::default()
        };
        assert!(!interpret(&[Detection::new("closed", 0.9)], &config).eyes_closed);
        assert!(interpret(&[Detection::new("Drowsy", 0.9)], &config).eyes_closed);
    }

    #[test]
    fn test_label_accessor_errors() {
        assert!(matches!(
            Detection::new("  ", 0.5).label(),
            Err(DmsError::MalformedDetectionInput(_))
        ));
        assert_eq!(Detection::new(" open ", 0.5).label().unwrap(), "open");
    }

    #[test]
    fn test_detection_json_without_label() {
        let detection: Detection = serde_json::from_str(r#"{"confidence": 0.7}"#).unwrap();
        assert!(detection.label.is_none());
        assert!(detection.label().is_err());
    }
}
