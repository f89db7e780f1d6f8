//! Replay of recorded detections

use std::collections::VecDeque;
use std::path::Path;

use camera_capture::VideoFrame;
use dms::Detection;
use tracing::{info, warn};

use crate::{Detector, InferenceError};

/// Detector that replays one JSON array of detections per frame.
///
/// Blank lines, unparsable lines and frames past the end of the script
/// yield no detections.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    frames: VecDeque<String>,
    line: usize,
}

impl ScriptedDetector {
    /// Load a JSON-lines script
    pub fn open(path: &Path) -> Result<Self, InferenceError> {
        let content = std::fs::read_to_string(path)?;
        info!("Loaded detection script {} ({} frames)", path.display(), content.lines().count());
        Ok(Self::from_script(&content))
    }

    pub fn from_script(content: &str) -> Self {
        Self {
            frames: content.lines().map(str::to_string).collect(),
            line: 0,
        }
    }
}

impl Detector for ScriptedDetector {
    fn detect(
        &mut self,
        _frame: &VideoFrame,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, InferenceError> {
        let Some(raw) = self.frames.pop_front() else {
            return Ok(Vec::new());
        };
        self.line += 1;

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Vec<Detection>>(&raw) {
            Ok(detections) => Ok(detections
                .into_iter()
                .filter(|d| d.confidence >= confidence_threshold)
                .collect()),
            Err(e) => {
                warn!("Detection script line {} unreadable: {}", self.line, e);
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> VideoFrame {
        VideoFrame::filled(2, 2, [0, 0, 0], 0, 0)
    }

    #[test]
    fn test_replay_with_threshold() {
        let script = concat!(
            r#"[{"label": "mata_tutup", "confidence": 0.9}, {"label": "mata_buka", "confidence": 0.3}]"#,
            "\n",
            "\n",
            r#"[{"confidence": 0.8}]"#,
        );
        let mut detector = ScriptedDetector::from_script(script);

        let first = detector.detect(&frame(), 0.5).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].label.as_deref(), Some("mata_tutup"));

        assert!(detector.detect(&frame(), 0.5).unwrap().is_empty());

        let third = detector.detect(&frame(), 0.5).unwrap();
        assert_eq!(third.len(), 1);
        assert!(third[0].label.is_none());

        assert!(detector.detect(&frame(), 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_bad_line_yields_nothing() {
        let mut detector = ScriptedDetector::from_script("not json\n[]");
        assert!(detector.detect(&frame(), 0.5).unwrap().is_empty());
        assert!(detector.detect(&frame(), 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.jsonl");
        std::fs::write(&path, r#"[{"label": "closed", "confidence": 0.7}]"#).unwrap();

        let mut detector = ScriptedDetector::open(&path).unwrap();
        assert_eq!(detector.detect(&frame(), 0.5).unwrap().len(), 1);

        assert!(matches!(
            ScriptedDetector::open(&dir.path().join("missing.jsonl")),
            Err(InferenceError::Script(_))
        ));
    }
}
