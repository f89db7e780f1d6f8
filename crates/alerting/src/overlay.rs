//! Frame overlay rendering

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use camera_capture::VideoFrame;
use dms::{Detection, SharedSettings, Status, TrackerOutput};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, info};

use crate::{AlertError, Renderer};

const SAFE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const WARNING_COLOR: Rgb<u8> = Rgb([255, 165, 0]);
const ALARM_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const UNLABELLED_COLOR: Rgb<u8> = Rgb([160, 160, 160]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const ALARM_BORDER_PX: u32 = 10;
const ALARM_TEXT: &str = "DANGER! WAKE UP!";

/// Draws detections and alarm state onto frames.
///
/// Closed-eye boxes are red, other labelled boxes green. A status bar along
/// the top edge shows the status colour; in ALARM the whole frame gets a
/// thick red border. With a font loaded, captions show the closure time,
/// the frame rate and the alarm message.
pub struct OverlayRenderer {
    settings: SharedSettings,
    output_dir: Option<PathBuf>,
    font: Option<FontVec>,
    last_timestamp_ns: Option<u64>,
    last_frame: Option<RgbImage>,
}

impl OverlayRenderer {
    pub fn new(settings: SharedSettings, output_dir: Option<PathBuf>) -> Result<Self, AlertError> {
        if let Some(dir) = &output_dir {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Self {
            settings,
            output_dir,
            font: None,
            last_timestamp_ns: None,
            last_frame: None,
        })
    }

    /// Load a font for captions
    pub fn with_font(mut self, path: &Path) -> Result<Self, AlertError> {
        let bytes = std::fs::read(path)?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| AlertError::Font(format!("{}: {}", path.display(), e)))?;
        info!("Overlay captions use font {}", path.display());
        self.font = Some(font);
        Ok(self)
    }

    /// Most recently rendered frame
    pub fn last_frame(&self) -> Option<&RgbImage> {
        self.last_frame.as_ref()
    }

    fn draw(
        &self,
        img: &mut RgbImage,
        detections: &[Detection],
        output: &TrackerOutput,
        fps: Option<f64>,
    ) {
        let config = self.settings.snapshot();
        let (width, height) = img.dimensions();

        for detection in detections {
            let Some(bbox) = detection.bbox else {
                continue;
            };
            let color = match detection.label() {
                Ok(label) if config.is_closed_label(label) => ALARM_COLOR,
                Ok(_) => SAFE_COLOR,
                Err(_) => UNLABELLED_COLOR,
            };
            let clamped = clamp_rect(bbox.x, bbox.y, bbox.width, bbox.height, width, height);
            if let Some(rect) = clamped {
                draw_hollow_rect_mut(img, rect, color);
            }
        }

        let status_color = match output.status {
            Status::Safe => SAFE_COLOR,
            Status::Warning => WARNING_COLOR,
            Status::Alarm => ALARM_COLOR,
        };
        let bar_height = (height / 20).max(4).min(height);
        draw_filled_rect_mut(img, Rect::at(0, 0).of_size(width, bar_height), status_color);

        if output.status == Status::Alarm {
            let thickness = ALARM_BORDER_PX.min(width / 2).min(height / 2);
            for inset in 0..thickness {
                let rect = Rect::at(inset as i32, inset as i32)
                    .of_size(width - 2 * inset, height - 2 * inset);
                draw_hollow_rect_mut(img, rect, ALARM_COLOR);
            }
        }

        if let Some(font) = &self.font {
            let scale = PxScale::from((height as f32 / 20.0).max(12.0));
            let mut y = (bar_height + ALARM_BORDER_PX) as i32;
            for line in captions(output, fps) {
                draw_text_mut(img, TEXT_COLOR, ALARM_BORDER_PX as i32, y, scale, font, &line);
                y += scale.y as i32 + 2;
            }
            if output.status == Status::Alarm {
                let alarm_scale = PxScale::from(scale.y * 2.0);
                let (x, y) = ((width / 8) as i32, (height / 2) as i32);
                draw_text_mut(img, ALARM_COLOR, x, y, alarm_scale, font, ALARM_TEXT);
            }
        }
    }
}

/// Caption lines for the top-left corner
fn captions(output: &TrackerOutput, fps: Option<f64>) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(fps) = fps {
        lines.push(format!("FPS: {:.1}", fps));
    }
    if output.status != Status::Safe {
        lines.push(format!("Eyes closed: {:.1}s", output.elapsed_seconds));
    }
    lines
}

/// Clip a box to the image; `None` when nothing visible remains
fn clamp_rect(x: f32, y: f32, w: f32, h: f32, max_w: u32, max_h: u32) -> Option<Rect> {
    let left = x.max(0.0).min(max_w as f32) as u32;
    let top = y.max(0.0).min(max_h as f32) as u32;
    let right = (x + w).max(0.0).min(max_w as f32) as u32;
    let bottom = (y + h).max(0.0).min(max_h as f32) as u32;

    if right <= left || bottom <= top {
        return None;
    }
    Some(Rect::at(left as i32, top as i32).of_size(right - left, bottom - top))
}

impl Renderer for OverlayRenderer {
    fn render(
        &mut self,
        frame: &VideoFrame,
        detections: &[Detection],
        output: &TrackerOutput,
    ) -> Result<(), AlertError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(AlertError::Frame("empty frame".into()));
        }
        let mut img = frame
            .to_rgb_image()
            .map_err(|e| AlertError::Frame(e.to_string()))?;

        let fps = self
            .last_timestamp_ns
            .and_then(|last| frame.timestamp_ns.checked_sub(last))
            .filter(|delta| *delta > 0)
            .map(|delta| 1e9 / delta as f64);
        self.last_timestamp_ns = Some(frame.timestamp_ns);

        self.draw(&mut img, detections, output, fps);

        if let Some(dir) = &self.output_dir {
            let path = dir.join(format!("frame_{:06}.png", frame.sequence));
            img.save(&path)?;
            debug!("Wrote overlay {}", path.display());
        }

        self.last_frame = Some(img);
        Ok(())
    }
}
