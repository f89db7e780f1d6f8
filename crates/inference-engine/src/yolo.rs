//! YOLOv8 detector on ONNX Runtime

use std::time::Instant;

use camera_capture::VideoFrame;
use dms::{BoundingBox, Detection};
use image::imageops::{self, FilterType};
use ndarray::{Array4, ArrayView2, Axis, Ix2};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::ValueType;
use tracing::{debug, info, warn};

use crate::{ClassNames, DetectorConfig, Detector, InferenceError};

/// Box offsets (cx, cy, w, h) precede the class scores in each output column
const CXYWH_OFFSET: usize = 4;
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Candidate box before suppression
#[derive(Debug, Clone, Copy)]
struct Candidate {
    class_id: usize,
    confidence: f32,
    bbox: BoundingBox,
}

/// YOLOv8 object detector
pub struct YoloDetector {
    session: Session,
    names: ClassNames,
    input_width: u32,
    input_height: u32,
    iou_threshold: f32,
}

impl YoloDetector {
    /// Load the ONNX model and its class names
    pub fn load(config: &DetectorConfig) -> Result<Self, InferenceError> {
        info!("Loading detection model from {}", config.model_path.display());

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(&config.model_path))
            .map_err(|e| InferenceError::ModelLoadError(e.to_string()))?;

        let (input_height, input_width) = session
            .inputs
            .first()
            .and_then(|input| match &input.input_type {
                ValueType::Tensor { dimensions, .. } if dimensions.len() == 4 => {
                    Some((dimensions[2], dimensions[3]))
                }
                _ => None,
            })
            .map(|(h, w)| (positive_or_default(h), positive_or_default(w)))
            .unwrap_or((DEFAULT_INPUT_SIZE, DEFAULT_INPUT_SIZE));

        let names = match &config.class_names {
            Some(list) => ClassNames::from_list(list),
            None => {
                let raw = session
                    .metadata()
                    .and_then(|m| m.custom("names"))
                    .map_err(|e| InferenceError::ModelLoadError(e.to_string()))?;
                match raw {
                    Some(raw) => ClassNames::parse_metadata(&raw)?,
                    None => {
                        warn!("Model has no class names; detections will be unlabelled");
                        ClassNames::default()
                    }
                }
            }
        };

        info!(
            "Model loaded: input {}x{}, {} classes",
            input_width,
            input_height,
            names.len()
        );

        Ok(Self {
            session,
            names,
            input_width,
            input_height,
            iou_threshold: config.iou_threshold,
        })
    }

    pub fn class_names(&self) -> &ClassNames {
        &self.names
    }

    fn preprocess(&self, frame: &VideoFrame) -> Result<Array4<f32>, InferenceError> {
        let img = frame
            .to_rgb_image()
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;
        let (width, height) = (self.input_width, self.input_height);
        let resized = imageops::resize(&img, width, height, FilterType::Triangle);

        let mut input = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            input[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }

        Ok(input)
    }
}

impl Detector for YoloDetector {
    fn detect(
        &mut self,
        frame: &VideoFrame,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, InferenceError> {
        let start = Instant::now();
        let input = self.preprocess(frame)?;

        let inputs =
            ort::inputs![input].map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;
        let output = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let shape_error = || InferenceError::InvalidOutputShape {
            expected: format!("[1, {}+classes, anchors]", CXYWH_OFFSET),
            actual: format!("{:?}", output.shape()),
        };
        if output.ndim() != 3 || output.shape()[0] == 0 || output.shape()[1] <= CXYWH_OFFSET {
            return Err(shape_error());
        }
        let predictions = output
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(|_| shape_error())?;

        let scale = (
            frame.width as f32 / self.input_width as f32,
            frame.height as f32 / self.input_height as f32,
        );
        let detections = decode_predictions(
            predictions,
            &self.names,
            confidence_threshold,
            self.iou_threshold,
            scale,
        );

        debug!(
            "Detection completed in {}ms ({} boxes)",
            start.elapsed().as_millis(),
            detections.len()
        );
        Ok(detections)
    }
}

fn positive_or_default(dim: i64) -> u32 {
    u32::try_from(dim).ok().filter(|d| *d > 0).unwrap_or(DEFAULT_INPUT_SIZE)
}

/// Turn a `[4 + classes, anchors]` prediction matrix into detections.
///
/// Each anchor keeps its best class; anchors below the threshold are dropped,
/// then overlapping boxes of the same class are suppressed. Class ids with no
/// known name produce unlabelled detections.
fn decode_predictions(
    predictions: ArrayView2<'_, f32>,
    names: &ClassNames,
    confidence_threshold: f32,
    iou_threshold: f32,
    (scale_x, scale_y): (f32, f32),
) -> Vec<Detection> {
    let mut candidates = Vec::new();

    for column in predictions.axis_iter(Axis(1)) {
        let best = column
            .iter()
            .skip(CXYWH_OFFSET)
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (id, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((id, score)),
            });

        let Some((class_id, confidence)) = best else {
            continue;
        };
        if confidence < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (column[0], column[1], column[2], column[3]);
        candidates.push(Candidate {
            class_id,
            confidence,
            bbox: BoundingBox {
                x: ((cx - w / 2.0) * scale_x).max(0.0),
                y: ((cy - h / 2.0) * scale_y).max(0.0),
                width: w * scale_x,
                height: h * scale_y,
            },
        });
    }

    non_max_suppression(&mut candidates, iou_threshold);

    candidates
        .into_iter()
        .map(|c| Detection {
            label: names.get(c.class_id).map(str::to_string),
            confidence: c.confidence,
            bbox: Some(c.bbox),
        })
        .collect()
}

/// Keep the most confident box among same-class boxes overlapping above `iou_threshold`
fn non_max_suppression(candidates: &mut Vec<Candidate>, iou_threshold: f32) {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates.drain(..) {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }

    *candidates = kept;
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = (a.x + a.width).min(b.x + b.width);
    let bottom = (a.y + a.height).min(b.y + b.height);

    let intersection = (right - left).max(0.0) * (bottom - top).max(0.0);
    let union = a.width * a.height + b.width * b.height - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}
