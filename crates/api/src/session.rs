//! Monitoring session loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use alerting::{Notifier, Renderer};
use camera_capture::{FrameSource, VideoFrame};
use chrono::{DateTime, Utc};
use dms::{Detection, DrowsinessTracker, FrameEyes, SharedSettings, Status, TrackerOutput};
use inference_engine::Detector;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::AppError;

/// Lifecycle of the monitoring session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Not started yet
    #[default]
    Idle,
    Running,
    /// Source exhausted or stop requested
    Finished,
    /// Ended by a frame source error
    Failed,
}

/// Latest session state published to the control surface
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Error that ended the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub output: TrackerOutput,
    pub eyes: FrameEyes,
    /// Labels detected in the latest frame
    pub labels: Vec<String>,
    /// Frames processed this session
    pub frames: u64,
    /// Processing rate of the latest frame
    pub fps: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Totals for a finished session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub skipped_frames: u64,
    pub alarms: u64,
}

/// Requests a running session to stop after its current frame
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One monitoring stream: frames in, alarm decisions out.
///
/// Runs synchronously; callers put it on a blocking worker. The tracker is
/// created when the session starts and dropped when it ends.
pub struct MonitorSession {
    source: Box<dyn FrameSource>,
    detector: Box<dyn Detector>,
    renderers: Vec<Box<dyn Renderer>>,
    notifiers: Vec<Box<dyn Notifier>>,
    settings: SharedSettings,
    status_tx: watch::Sender<SessionStatus>,
    stop: StopHandle,
}

impl MonitorSession {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        settings: SharedSettings,
        status_tx: watch::Sender<SessionStatus>,
    ) -> Self {
        Self {
            source,
            detector,
            renderers: Vec::new(),
            notifiers: Vec::new(),
            settings,
            status_tx,
            stop: StopHandle::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderers.push(renderer);
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Process frames until the source ends or a stop is requested.
    ///
    /// Detector, renderer and notifier failures affect only the current
    /// frame. A failing frame source ends the session with an error.
    pub fn run(mut self) -> Result<SessionSummary, AppError> {
        info!("Monitoring session started");
        let mut tracker = DrowsinessTracker::with_settings(self.settings.clone());
        let mut summary = SessionSummary::default();
        let mut last_status = Status::Safe;

        self.status_tx.send_modify(|s| {
            *s = SessionStatus {
                state: SessionState::Running,
                ..Default::default()
            }
        });

        let result = loop {
            if self.stop.is_stopped() {
                info!("Monitoring session stop requested");
                break Ok(());
            }

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Frame source exhausted");
                    break Ok(());
                }
                Err(e) => break Err(AppError::from(e)),
            };

            let started = Instant::now();
            let Some((detections, eyes, output)) = self.track_frame(&mut tracker, &frame) else {
                summary.skipped_frames += 1;
                metrics::counter!("microsleep_frames_skipped_total").increment(1);
                continue;
            };
            let processing = started.elapsed().as_secs_f64();

            self.surface(&frame, &detections, &output);

            summary.frames += 1;
            if output.status == Status::Alarm && last_status != Status::Alarm {
                summary.alarms += 1;
                metrics::counter!("microsleep_alarms_total").increment(1);
            }
            last_status = output.status;

            metrics::counter!("microsleep_frames_total").increment(1);
            metrics::histogram!("microsleep_frame_processing_seconds").record(processing);
            metrics::gauge!("microsleep_eyes_closed_seconds").set(output.elapsed_seconds);

            let fps = if processing > 0.0 { 1.0 / processing } else { 0.0 };
            debug!(
                frame = frame.sequence,
                status = %output.status,
                elapsed = output.elapsed_seconds,
                fps,
                "Frame processed"
            );

            let frames = summary.frames;
            self.status_tx.send_modify(|s| {
                s.output = output;
                s.eyes = eyes;
                s.labels = detections
                    .iter()
                    .filter_map(|d| d.label.clone())
                    .collect();
                s.frames = frames;
                s.fps = fps;
                s.updated_at = Some(Utc::now());
            });
        };

        match &result {
            Ok(()) => self.status_tx.send_modify(|s| s.state = SessionState::Finished),
            Err(e) => {
                error!("Monitoring session failed: {}", e);
                let message = e.to_string();
                self.status_tx.send_modify(|s| {
                    s.state = SessionState::Failed;
                    s.error = Some(message);
                });
            }
        }
        info!(
            "Monitoring session ended: {} frames, {} skipped, {} alarms",
            summary.frames, summary.skipped_frames, summary.alarms
        );

        result.map(|_| summary)
    }

    /// Detect and update the tracker; `None` when detection failed
    fn track_frame(
        &mut self,
        tracker: &mut DrowsinessTracker,
        frame: &VideoFrame,
    ) -> Option<(Vec<Detection>, FrameEyes, TrackerOutput)> {
        let config = self.settings.snapshot();
        let detections = match self.detector.detect(frame, config.confidence_threshold) {
            Ok(detections) => detections,
            Err(e) => {
                warn!("Detection failed on frame {}: {}", frame.sequence, e);
                return None;
            }
        };

        let (eyes, output) = tracker.observe_with(&detections, frame.timestamp(), &config);
        if eyes.skipped_malformed > 0 {
            warn!(
                "Ignored {} malformed detection(s) on frame {}",
                eyes.skipped_malformed, frame.sequence
            );
        }
        Some((detections, eyes, output))
    }

    fn surface(&mut self, frame: &VideoFrame, detections: &[Detection], output: &TrackerOutput) {
        for renderer in &mut self.renderers {
            if let Err(e) = renderer.render(frame, detections, output) {
                warn!("Render failed on frame {}: {}", frame.sequence, e);
            }
        }
        for notifier in &mut self.notifiers {
            if let Err(e) = notifier.notify(output) {
                warn!("Notification failed on frame {}: {}", frame.sequence, e);
            }
        }
    }
}
