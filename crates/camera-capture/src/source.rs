//! Frame sources

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{CameraConfig, CameraError, SourceKind, VideoFrame};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Supplies frames in arrival order
pub trait FrameSource: Send {
    /// Next frame, or `None` at end of stream
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;
}

/// Open the source selected by `config.kind`
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    match config.kind {
        SourceKind::Images => Ok(Box::new(ImageSequenceSource::open(config)?)),
        #[cfg(feature = "camera")]
        SourceKind::Device => Ok(Box::new(crate::CameraSource::open(config)?)),
        #[cfg(not(feature = "camera"))]
        SourceKind::Device => Err(CameraError::Open(
            "camera support not built; enable the `camera` feature".into(),
        )),
    }
}

/// Directory of still images played back as a stream.
///
/// Files are read in file-name order. Frames are stamped on a synthetic
/// clock at the configured fps, so a replay always produces the same
/// timestamps regardless of processing speed.
pub struct ImageSequenceSource {
    pending: VecDeque<PathBuf>,
    frame_interval_ns: u64,
    sequence: u32,
}

impl ImageSequenceSource {
    /// Open a frame directory
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        if config.fps == 0 {
            return Err(CameraError::Open("fps must be greater than 0".into()));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&config.source)
            .map_err(|e| CameraError::Open(format!("{}: {}", config.source.display(), e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        paths.sort();

        info!(
            "Opened image sequence {} ({} frames @ {} fps)",
            config.source.display(),
            paths.len(),
            config.fps
        );

        Ok(Self {
            pending: paths.into(),
            frame_interval_ns: 1_000_000_000 / u64::from(config.fps),
            sequence: 0,
        })
    }

    /// Frames not yet read
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        while let Some(path) = self.pending.pop_front() {
            let img = match image::open(&path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    warn!("Skipping unreadable frame {}: {}", path.display(), e);
                    continue;
                }
            };

            let sequence = self.sequence;
            self.sequence += 1;
            let timestamp_ns = u64::from(sequence) * self.frame_interval_ns;
            debug!("Read frame {} from {}", sequence, path.display());

            return Ok(Some(VideoFrame::from_rgb_image(img, timestamp_ns, sequence)));
        }

        Ok(None)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Prepared frames held in memory
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<VideoFrame>,
}

impl MemorySource {
    pub fn new(frames: Vec<VideoFrame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// `count` solid grey frames spaced at `fps`
    pub fn uniform(count: u32, width: u32, height: u32, fps: u32) -> Self {
        let interval_ns = 1_000_000_000 / u64::from(fps.max(1));
        let frames = (0..count)
            .map(|i| {
                let timestamp_ns = u64::from(i) * interval_ns;
                VideoFrame::filled(width, height, [128, 128, 128], timestamp_ns, i)
            })
            .collect();
        Self::new(frames)
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        Ok(self.frames.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn write_frame(dir: &Path, name: &str, shade: u8) {
        RgbImage::from_pixel(8, 6, image::Rgb([shade, shade, shade]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_sequence_order_and_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "frame_002.png", 2);
        write_frame(dir.path(), "frame_001.png", 1);
        write_frame(dir.path(), "frame_003.png", 3);
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let config = CameraConfig {
            source: dir.path().to_path_buf(),
            fps: 10,
            ..Default::default()
        };
        let mut source = ImageSequenceSource::open(&config).unwrap();
        assert_eq!(source.remaining(), 3);

        let mut shades = Vec::new();
        let mut stamps = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            shades.push(frame.data[0]);
            stamps.push(frame.timestamp_ns);
        }

        assert_eq!(shades, vec![1, 2, 3]);
        assert_eq!(stamps, vec![0, 100_000_000, 200_000_000]);
    }

    #[test]
    fn test_unreadable_frame_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "a.png", 1);
        std::fs::write(dir.path().join("b.png"), b"corrupt").unwrap();
        write_frame(dir.path(), "c.png", 3);

        let config = CameraConfig {
            source: dir.path().to_path_buf(),
            fps: 5,
            ..Default::default()
        };
        let mut source = ImageSequenceSource::open(&config).unwrap();

        let first = source.next_frame().unwrap().unwrap();
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(second.data[0], 3);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_open_errors() {
        let config = CameraConfig {
            source: PathBuf::from("/nonexistent/frames"),
            fps: 15,
            ..Default::default()
        };
        assert!(matches!(
            ImageSequenceSource::open(&config),
            Err(CameraError::Open(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let config = CameraConfig {
            source: dir.path().to_path_buf(),
            fps: 0,
            ..Default::default()
        };
        assert!(ImageSequenceSource::open(&config).is_err());
    }

    #[test]
    fn test_open_source_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "only.png", 9);

        let config = CameraConfig {
            source: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut source = open_source(&config).unwrap();
        assert_eq!(source.next_frame().unwrap().unwrap().data[0], 9);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[cfg(not(feature = "camera"))]
    #[test]
    fn test_device_requires_camera_feature() {
        let config = CameraConfig {
            kind: SourceKind::Device,
            ..Default::default()
        };
        assert!(matches!(open_source(&config), Err(CameraError::Open(_))));
    }

    #[test]
    fn test_memory_source() {
        let mut source = MemorySource::uniform(3, 4, 4, 2);
        let mut count = 0;
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.timestamp_ns, u64::from(frame.sequence) * 500_000_000);
            count += 1;
        }
        assert_eq!(count, 3);
    }
}
