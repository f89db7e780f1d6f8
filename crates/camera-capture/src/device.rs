//! Live capture from a local camera

use std::time::Instant;

use opencv::{core::Mat, imgproc, prelude::*, videoio};
use tracing::{debug, info};

use crate::{CameraConfig, CameraError, FrameSource, VideoFrame};

/// Frames from a camera device via OpenCV.
///
/// Frames are stamped with monotonic time since the first frame was read.
pub struct CameraSource {
    capture: videoio::VideoCapture,
    device: i32,
    started: Option<Instant>,
    sequence: u32,
}

impl CameraSource {
    /// Open camera `config.device`
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let open_err = |e: opencv::Error| CameraError::Open(e.to_string());

        let mut capture =
            videoio::VideoCapture::new(config.device, videoio::CAP_ANY).map_err(open_err)?;
        if !capture.is_opened().map_err(open_err)? {
            return Err(CameraError::Open(format!(
                "camera {} is not available",
                config.device
            )));
        }
        if config.fps > 0 {
            // Best effort; many drivers ignore the request
            let accepted = capture
                .set(videoio::CAP_PROP_FPS, f64::from(config.fps))
                .map_err(open_err)?;
            debug!("Requested {} fps from camera: accepted={}", config.fps, accepted);
        }

        info!("Opened camera {}", config.device);
        Ok(Self {
            capture,
            device: config.device,
            started: None,
            sequence: 0,
        })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        let stream_err = |e: opencv::Error| CameraError::Stream(e.to_string());

        let mut bgr = Mat::default();
        let grabbed = self.capture.read(&mut bgr).map_err(stream_err)?;
        let size = bgr.size().map_err(stream_err)?;
        if !grabbed || size.width == 0 || size.height == 0 {
            info!("Camera {} stopped delivering frames", self.device);
            return Ok(None);
        }

        let started = *self.started.get_or_insert_with(Instant::now);
        let timestamp_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB).map_err(stream_err)?;
        let data = rgb.data_bytes().map_err(stream_err)?.to_vec();

        let sequence = self.sequence;
        self.sequence += 1;
        VideoFrame::new(
            data,
            size.width as u32,
            size.height as u32,
            timestamp_ns,
            sequence,
        )
        .map(Some)
    }
}
