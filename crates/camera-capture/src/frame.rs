//! Video frame types and processing

use std::time::Duration;

use image::RgbImage;

use crate::CameraError;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds since stream start)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        timestamp_ns: u64,
        sequence: u32,
    ) -> Result<Self, CameraError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CameraError::Format(format!(
                "expected {} bytes for {}x{} RGB, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        })
    }

    /// Solid-colour frame
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], timestamp_ns: u64, sequence: u32) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Wrap a decoded image
    pub fn from_rgb_image(img: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Copy into an `image` buffer
    pub fn to_rgb_image(&self) -> Result<RgbImage, CameraError> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| CameraError::Format("frame buffer size mismatch".into()))
    }

    /// Capture time as a duration since stream start
    pub fn timestamp(&self) -> Duration {
        Duration::from_nanos(self.timestamp_ns)
    }
}
