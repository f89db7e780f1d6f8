//! Eye-closure timer and alarm decision

use std::time::Duration;

use tracing::info;

use crate::detection::{interpret, Detection, FrameEyes};
use crate::state::{Status, TrackerOutput, TrackerState};
use crate::{DmsError, SharedSettings, TrackerConfig};

/// Drowsiness state tracker.
///
/// Turns a per-frame "eyes closed" signal and a timestamp into an alarm
/// decision. The alarm needs a closure run lasting the configured duration;
/// a single closed frame only raises a warning. One tracker belongs to one
/// session and is driven from a single thread in frame order.
#[derive(Debug)]
pub struct DrowsinessTracker {
    settings: SharedSettings,
    state: TrackerState,
}

impl DrowsinessTracker {
    /// Create a tracker with its own settings
    pub fn new(config: TrackerConfig) -> Result<Self, DmsError> {
        Ok(Self::with_settings(SharedSettings::new(config)?))
    }

    /// Create a tracker reading settings that a control surface may replace
    pub fn with_settings(settings: SharedSettings) -> Self {
        let config = settings.snapshot();
        info!(
            "Creating drowsiness tracker: threshold={} duration={}s",
            config.confidence_threshold, config.alarm_duration_seconds
        );
        Self {
            settings,
            state: TrackerState::default(),
        }
    }

    /// Settings handle used by this tracker
    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// Advance the tracker by one frame.
    ///
    /// `now` must not decrease between calls; if it does, elapsed time
    /// saturates at zero. Settings changes apply from the next call.
    pub fn update(&mut self, eyes_closed: bool, now: Duration) -> TrackerOutput {
        let config = self.settings.snapshot();
        self.step(eyes_closed, now, &config)
    }

    /// Interpret one frame's detections and advance the tracker, using a
    /// single settings snapshot for both steps.
    pub fn observe(
        &mut self,
        detections: &[Detection],
        now: Duration,
    ) -> (FrameEyes, TrackerOutput) {
        let config = self.settings.snapshot();
        self.observe_with(detections, now, &config)
    }

    /// Like [`observe`](Self::observe), against a snapshot the caller already
    /// holds for this frame.
    pub fn observe_with(
        &mut self,
        detections: &[Detection],
        now: Duration,
        config: &TrackerConfig,
    ) -> (FrameEyes, TrackerOutput) {
        let eyes = interpret(detections, config);
        let output = self.step(eyes.eyes_closed, now, config);
        (eyes, output)
    }

    /// Start of the current closure run, if eyes are closed
    pub fn closure_start(&self) -> Option<Duration> {
        self.state.closure_start
    }

    /// Forget the current closure run
    pub fn reset(&mut self) {
        self.state.reset();
    }

    fn step(&mut self, eyes_closed: bool, now: Duration, config: &TrackerConfig) -> TrackerOutput {
        if !eyes_closed {
            self.state.closure_start = None;
            return TrackerOutput::default();
        }

        let start = *self.state.closure_start.get_or_insert(now);
        let elapsed = now.saturating_sub(start);
        // Compare as Duration; f64 seconds can round either side of the boundary
        let alarm_active = elapsed >= config.alarm_duration();
        let elapsed_seconds = elapsed.as_nanos() as f64 / 1e9;

        TrackerOutput {
            status: if alarm_active {
                Status::Alarm
            } else {
                Status::Warning
            },
            elapsed_seconds,
            alarm_active,
        }
    }
}
